use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, Component, Event, EventLike};
use url::Url;

use crate::models::YogaClass;

const GOOGLE_CALENDAR_URL: &str = "https://calendar.google.com/calendar/render";

fn ends_at(class: &YogaClass) -> NaiveDateTime {
    let minutes = if class.duration > 0 { class.duration } else { 60 };
    class.starts_at() + Duration::minutes(i64::from(minutes))
}

/// "Add to calendar" link for confirmation mails; times are sent in UTC with `ctz` for display.
pub fn google_calendar_link(class: &YogaClass, location: &str, tz: Tz) -> String {
    let to_utc = |local: NaiveDateTime| {
        tz.from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string())
            .unwrap_or_default()
    };
    let dates = format!("{}/{}", to_utc(class.starts_at()), to_utc(ends_at(class)));
    let details = format!(
        "Yoga class: {}",
        class.description.as_deref().unwrap_or(&class.title)
    );

    Url::parse_with_params(
        GOOGLE_CALENDAR_URL,
        &[
            ("action", "TEMPLATE"),
            ("text", class.title.as_str()),
            ("dates", dates.as_str()),
            ("details", details.as_str()),
            ("location", location),
            ("ctz", tz.name()),
        ],
    )
    .map(|url| url.to_string())
    .unwrap_or_else(|_| GOOGLE_CALENDAR_URL.to_string())
}

#[derive(Clone)]
pub struct ICalExporter {
    studio_name: String,
    location: String,
}

impl ICalExporter {
    pub fn new(studio_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            studio_name: studio_name.into(),
            location: location.into(),
        }
    }

    pub fn generate(&self, classes: &[YogaClass]) -> Vec<u8> {
        if classes.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&format!("{} Timetable", self.studio_name));

        for class in classes {
            let mut event = Event::new();
            event.summary(&class.title);
            event.starts(class.starts_at());
            event.ends(ends_at(class));
            event.location(&self.location);
            event.description(&format!(
                "{}\nCapacity: {}\nPrice: {:.2}",
                class.description.as_deref().unwrap_or_default(),
                class.capacity,
                class.price
            ));
            event.uid(&format!("class-{}@yoga-studio", class.id));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn class() -> YogaClass {
        YogaClass {
            id: 5,
            title: "Yin Yoga".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            capacity: 12,
            price: 10.0,
            duration: 75,
        }
    }

    #[test]
    fn test_generate_single_class() {
        let exporter = ICalExporter::new("Zen Jen's Yoga", "Uddingston");
        let body = String::from_utf8(exporter.generate(&[class()])).unwrap();
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("Yin Yoga"));
        assert!(body.contains("class-5@yoga-studio"));
    }

    #[test]
    fn test_generate_empty() {
        let exporter = ICalExporter::new("Zen Jen's Yoga", "Uddingston");
        assert!(exporter.generate(&[]).is_empty());
    }

    #[test]
    fn test_google_calendar_link_uses_utc() {
        // 19:00 BST is 18:00 UTC
        let link = google_calendar_link(&class(), "Uddingston", chrono_tz::Europe::London);
        assert!(link.starts_with(GOOGLE_CALENDAR_URL));
        assert!(link.contains("20250701T180000Z%2F20250701T191500Z"));
        assert!(link.contains("ctz=Europe%2FLondon"));
    }
}

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.]").expect("regex compiles"));

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("object storage returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid storage URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Public-bucket object storage living next to the data store.
#[derive(Clone)]
pub struct ObjectStorage {
    client: reqwest::Client,
    storage_url: Url,
    bucket: String,
    service_key: String,
}

impl ObjectStorage {
    pub fn new(
        base_url: &Url,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            client: reqwest::Client::new(),
            storage_url: base_url.join("storage/v1/")?,
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    /// `public/{millis}-{name}` with anything outside `[A-Za-z0-9.]` replaced by `_`.
    pub fn gallery_path(file_name: &str, now: DateTime<Utc>) -> String {
        let safe = UNSAFE_FILENAME_CHARS.replace_all(file_name, "_");
        format!("public/{}-{}", now.timestamp_millis(), safe)
    }

    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        Ok(self
            .storage_url
            .join(&format!("object/{}/{}", self.bucket, path))?)
    }

    pub fn public_url(&self, path: &str) -> Result<Url, StorageError> {
        Ok(self
            .storage_url
            .join(&format!("object/public/{}/{}", self.bucket, path))?)
    }

    async fn check(response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Status { status, message })
    }

    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url(path)?)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.object_url(path)?)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_path_sanitises_name() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(
            ObjectStorage::gallery_path("sun salute (1).JPG", now),
            "public/1700000000123-sun_salute__1_.JPG"
        );
    }

    #[test]
    fn test_public_url() {
        let storage = ObjectStorage::new(
            &Url::parse("https://abc.supabase.co").unwrap(),
            "gallery-photos",
            "key",
        )
        .unwrap();
        assert_eq!(
            storage.public_url("public/1-a.jpg").unwrap().as_str(),
            "https://abc.supabase.co/storage/v1/object/public/gallery-photos/public/1-a.jpg"
        );
    }
}

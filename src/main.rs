#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    yoga_studio::run().await
}

use newsflash::ingestion;
use newsflash::scraping;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = ingestion::build_client(
        ingestion::DEFAULT_TIMEOUT_SECONDS,
        ingestion::DEFAULT_USER_AGENT,
    )
    .expect("Failed to build HTTP client");

    for source in scraping::default_sources(client, ingestion::DEFAULT_MAX_ATTEMPTS) {
        println!("\n{}", "=".repeat(60));
        println!("Testing: {}", source.name());
        println!("{}", "=".repeat(60));

        match source.fetch_candidates().await {
            Ok(candidates) => {
                println!("✓ Success!");
                println!("  Candidates: {}", candidates.len());

                if !candidates.is_empty() {
                    println!("\n  First 3 candidates:");
                    for (i, article) in candidates.iter().take(3).enumerate() {
                        println!("    {}. {}", i + 1, article.title);
                        println!("       Subject: {}", article.subject);
                        println!("       Time: {}", article.publication_time);
                        println!("       URL: {}", article.link);
                    }
                }
            }
            Err(e) => {
                println!("✗ Failed: {}", e);
            }
        }
    }
}

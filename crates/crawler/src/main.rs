use std::sync::Arc;

use anyhow::Result;
use common::{config::AppConfig, logging};
use gerrit_crawler::{Crawler, DocumentSink, HttpGerritClient, JsonLinesSink, PageFetcher};
use normalizer::ChangeExtractor;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;

    let client = Arc::new(HttpGerritClient::new(&config.gerrit.user_agent)?);
    let fetcher = PageFetcher::new(
        client,
        &config.gerrit.base_url,
        config.gerrit.repository.clone(),
    )?;
    let extractor = ChangeExtractor::new(config.gerrit.base_url.clone());
    let sink: Arc<dyn DocumentSink> = Arc::new(JsonLinesSink::new(&config.crawler.output_path));

    let crawler = Crawler::new(config.crawler.clone(), fetcher, extractor, sink);
    info!(
        base_url = %config.gerrit.base_url,
        repository = %config.gerrit.repository,
        output = %config.crawler.output_path,
        loop_delay = config.crawler.loop_delay_secs,
        "crawler started"
    );
    crawler.run().await?;
    Ok(())
}

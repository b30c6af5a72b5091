use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use common::config::CrawlerConfig;
use common::dates::format_for_db;
use normalizer::ChangeExtractor;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::fetcher::PageFetcher;
use crate::metrics;
use crate::sink::DocumentSink;

/// Counts for one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub since: String,
    pub changes: usize,
    pub documents: usize,
    pub failures: usize,
}

pub struct Crawler {
    config: CrawlerConfig,
    fetcher: PageFetcher,
    extractor: ChangeExtractor,
    sink: Arc<dyn DocumentSink>,
}

impl Crawler {
    pub fn new(
        config: CrawlerConfig,
        fetcher: PageFetcher,
        extractor: ChangeExtractor,
        sink: Arc<dyn DocumentSink>,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor,
            sink,
        }
    }

    /// Crawls until the process stops. A failed pass is logged and retried
    /// after the loop delay, unless `run_once` is set.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.run_once().await {
                Ok(_) => {}
                Err(err) if !self.config.run_once => {
                    warn!(error = ?err, "crawler pass failed");
                }
                Err(err) => return Err(err),
            }
            if self.config.run_once {
                break;
            }
            sleep(Duration::from_secs(self.config.loop_delay_secs)).await;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(repository = %self.fetcher.repository()))]
    pub async fn run_once(&self) -> Result<RunSummary> {
        metrics::RUNS_TOTAL.inc();
        metrics::LAST_RUN_TIMESTAMP.set(Utc::now().timestamp());
        let _timer = metrics::RUN_DURATION.start_timer();

        let result = self.crawl().await;
        match &result {
            Ok(summary) => {
                metrics::LAST_SUCCESS_TIMESTAMP.set(Utc::now().timestamp());
                info!(
                    since = %summary.since,
                    changes = summary.changes,
                    documents = summary.documents,
                    failures = summary.failures,
                    "crawler pass complete"
                );
            }
            Err(_) => metrics::RUN_FAILURES_TOTAL.inc(),
        }
        debug!(metrics = %metrics::render(), "crawler metrics");
        result
    }

    async fn crawl(&self) -> Result<RunSummary> {
        let since = self.since().await?;
        let raw_changes = self.fetcher.fetch(&since).await?;
        let extraction = self.extractor.extract_all(&raw_changes);

        metrics::EXTRACTION_FAILURES_TOTAL.inc_by(extraction.failures.len() as u64);
        for document in &extraction.documents {
            metrics::DOCUMENTS_EMITTED_TOTAL
                .with_label_values(&[document.type_name()])
                .inc();
        }
        self.sink
            .update(&extraction.documents)
            .await
            .context("storing documents")?;

        Ok(RunSummary {
            since,
            changes: raw_changes.len(),
            documents: extraction.documents.len(),
            failures: extraction.failures.len(),
        })
    }

    /// Resumes from the newest stored change, else the configured start.
    async fn since(&self) -> Result<String> {
        let stored = self
            .sink
            .last_updated(self.fetcher.repository())
            .await
            .context("reading last updated change")?;
        Ok(match stored {
            Some(updated_at) => format_for_db(&updated_at),
            None => self.config.updated_since.clone(),
        })
    }
}

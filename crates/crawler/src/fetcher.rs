use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use common::dates::convert_date_for_query;
use serde_json::Value;
use tracing::{info, instrument};
use url::Url;

use crate::client::GerritClient;
use crate::metrics;

pub const PAGE_SIZE: usize = 100;

/// Everything the extractor reads must be requested in the same query.
pub const QUERY_OPTIONS: [&str; 6] = [
    "MESSAGES",
    "DETAILED_ACCOUNTS",
    "DETAILED_LABELS",
    "CURRENT_REVISION",
    "CURRENT_FILES",
    "CURRENT_COMMIT",
];

/// Pages through the changes of one repository updated after a date.
pub struct PageFetcher {
    client: Arc<dyn GerritClient>,
    endpoint: Url,
    repository: String,
}

impl PageFetcher {
    pub fn new(
        client: Arc<dyn GerritClient>,
        base_url: &str,
        repository: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/changes/", base_url.trim_end_matches('/')))
            .with_context(|| format!("invalid gerrit base url {base_url}"))?;
        Ok(Self {
            client,
            endpoint,
            repository: repository.into(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Query for one page; `since_date` is already in `YYYY-MM-DD` form.
    pub fn query_url(&self, since_date: &str, start: usize) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &format!("after:{since_date} project:{}", self.repository));
            for option in QUERY_OPTIONS {
                pairs.append_pair("o", option);
            }
            pairs.append_pair("n", &PAGE_SIZE.to_string());
            pairs.append_pair("start", &start.to_string());
        }
        url
    }

    /// Returns every change updated after `since` (`YYYY-MM-DDTHH:MM:SSZ`),
    /// in server order. Any page failure fails the whole call.
    #[instrument(skip(self), fields(repository = %self.repository))]
    pub async fn fetch(&self, since: &str) -> Result<Vec<Value>> {
        let since_date = convert_date_for_query(since)?;
        let mut changes: Vec<Value> = Vec::new();
        loop {
            // The offset is what has been read so far, not a multiple of the page size.
            let url = self.query_url(&since_date, changes.len());
            info!(url = %url, "query");
            let started = Instant::now();
            let result = self.client.get_changes(&url).await;
            let outcome = if result.is_ok() { "success" } else { "error" };
            metrics::FETCH_REQUESTS_TOTAL
                .with_label_values(&[outcome])
                .inc();
            metrics::FETCH_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
            let page = result.with_context(|| format!("fetching changes from {url}"))?;

            if page.is_empty() {
                break;
            }
            metrics::CHANGES_FETCHED_TOTAL.inc_by(page.len() as u64);
            changes.extend(page);
            info!(count = changes.len(), "read changes from the api");
            if !has_more_changes(changes.last()) {
                break;
            }
        }
        Ok(changes)
    }
}

/// Gerrit flags the last change of a page with `_more_changes: true`.
fn has_more_changes(last: Option<&Value>) -> bool {
    last.and_then(|change| change.get("_more_changes"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

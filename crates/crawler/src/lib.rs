pub mod client;
pub mod fetcher;
pub mod metrics;
pub mod service;
pub mod sink;

pub use client::{GerritClient, HttpGerritClient};
pub use fetcher::PageFetcher;
pub use service::Crawler;
pub use sink::{DocumentSink, JsonLinesSink};

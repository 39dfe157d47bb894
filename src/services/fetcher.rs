// src/services/fetcher.rs
use crate::models::{ImageRecord, RecordSource};
use async_trait::async_trait;
use futures_util::future::join_all;
use image::DynamicImage;
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a single record could not be turned into pixels. Callers only log it;
/// every variant means "no image".
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("record has no usable source")]
    MissingSource,
}

/// Turns a record into the URL that actually serves its pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UrlStrategy {
    #[default]
    Direct,
    /// Strip trailing slashes from the stored base URL, then append `suffix`.
    PathSuffix { suffix: String },
}

impl UrlStrategy {
    pub fn url_for(&self, record: &ImageRecord) -> Option<String> {
        let RecordSource::Url { url } = &record.source else {
            return None;
        };
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(match self {
            UrlStrategy::Direct => url.to_string(),
            UrlStrategy::PathSuffix { suffix } => {
                format!("{}{}", url.trim_end_matches('/'), suffix)
            }
        })
    }
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, record: &ImageRecord) -> Result<DynamicImage, FetchFailure>;
}

/// Fetch every record, one result per input in input order, failures as `None`.
pub async fn fetch_all(
    fetcher: &dyn ImageFetcher,
    records: &[ImageRecord],
) -> Vec<Option<DynamicImage>> {
    let results = join_all(records.iter().map(|record| fetcher.fetch(record))).await;
    results
        .into_iter()
        .zip(records)
        .map(|(result, record)| match result {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Fetch failed for record {}: {}", record.id, e);
                None
            }
        })
        .collect()
}

/// Resolves URLs over HTTP and decodes uploaded bytes in place.
pub struct SourceFetcher {
    client: Client,
    urls: UrlStrategy,
}

impl SourceFetcher {
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        urls: UrlStrategy,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, urls })
    }

    async fn fetch_url(&self, url: &str) -> Result<DynamicImage, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Network(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchFailure::Status(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Network(e.to_string())
            }
        })?;

        decode(&body)
    }
}

#[async_trait]
impl ImageFetcher for SourceFetcher {
    async fn fetch(&self, record: &ImageRecord) -> Result<DynamicImage, FetchFailure> {
        match &record.source {
            RecordSource::Upload { data, .. } => decode(data),
            RecordSource::Url { .. } => {
                let url = self
                    .urls
                    .url_for(record)
                    .ok_or(FetchFailure::MissingSource)?;
                self.fetch_url(&url).await
            }
        }
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, FetchFailure> {
    if data.is_empty() {
        return Err(FetchFailure::MissingSource);
    }
    image::load_from_memory(data).map_err(|e| FetchFailure::Decode(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::stub::StubFetcher;
    use super::*;
    use image::GenericImageView;

    #[test]
    fn direct_strategy_uses_stored_url() {
        let record = ImageRecord::from_url("1", "https://cdn.example/a.jpg");
        assert_eq!(
            UrlStrategy::Direct.url_for(&record).as_deref(),
            Some("https://cdn.example/a.jpg")
        );
    }

    #[test]
    fn suffix_strategy_trims_trailing_slashes() {
        let strategy = UrlStrategy::PathSuffix {
            suffix: "/picture/photo".to_string(),
        };
        let record = ImageRecord::from_url("1", "https://host.example/media/42///");
        assert_eq!(
            strategy.url_for(&record).as_deref(),
            Some("https://host.example/media/42/picture/photo")
        );
    }

    #[test]
    fn uploads_have_no_url() {
        let record = ImageRecord {
            source: RecordSource::Upload {
                filename: "a.jpg".into(),
                data: vec![1],
            },
            ..ImageRecord::from_url("1", "")
        };
        assert!(UrlStrategy::Direct.url_for(&record).is_none());
    }

    #[tokio::test]
    async fn fetch_all_preserves_order_and_maps_failures() {
        let fetcher = StubFetcher::default();
        let records = vec![
            ImageRecord::from_url("port-0", "x"),
            ImageRecord::from_url("broken-1", "x"),
            ImageRecord::from_url("land-2", "x"),
        ];
        let images = fetch_all(&fetcher, &records).await;
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].as_ref().map(|i| i.width()), Some(30));
        assert!(images[1].is_none());
        assert_eq!(images[2].as_ref().map(|i| i.width()), Some(40));
        assert_eq!(fetcher.call_count(), 3);
    }

    #[tokio::test]
    async fn undecodable_upload_is_a_failure() {
        let fetcher =
            SourceFetcher::new(Duration::from_secs(1), "test", UrlStrategy::Direct).unwrap();
        let record = ImageRecord {
            source: RecordSource::Upload {
                filename: "junk.jpg".into(),
                data: b"not an image".to_vec(),
            },
            ..ImageRecord::from_url("1", "")
        };
        assert!(matches!(
            fetcher.fetch(&record).await,
            Err(FetchFailure::Decode(_))
        ));
    }
}

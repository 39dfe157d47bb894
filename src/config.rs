// src/config.rs
use crate::errors::ContactSheetError;
use crate::models::{CanvasLayout, SelectionMode};
use crate::services::fetcher::UrlStrategy;
use crate::services::normalizer::IMAGE_SUFFIXES;
use crate::services::ranking::RankingStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub session_ttl_secs: usize,
    pub url_strategy: UrlStrategy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            redis_url: None,
            fetch_timeout: Duration::from_secs(5),
            user_agent: "Mozilla/5.0".to_string(),
            session_ttl_secs: 86400,
            url_strategy: UrlStrategy::Direct,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_secs = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            bind_addr: lookup("CONTACT_SHEETS_BIND").unwrap_or(defaults.bind_addr),
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            fetch_timeout: Duration::from_secs(parse_secs(
                "CONTACT_SHEETS_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )),
            user_agent: lookup("CONTACT_SHEETS_USER_AGENT").unwrap_or(defaults.user_agent),
            session_ttl_secs: parse_secs(
                "CONTACT_SHEETS_SESSION_TTL_SECS",
                defaults.session_ttl_secs as u64,
            ) as usize,
            url_strategy: match lookup("CONTACT_SHEETS_URL_SUFFIX") {
                Some(suffix) if !suffix.trim().is_empty() => UrlStrategy::PathSuffix { suffix },
                _ => UrlStrategy::Direct,
            },
        }
    }
}

/// Per-session tunables. Every numeric cap lives here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    pub intake_limit: usize,
    /// Accepted link endings for CSV and pasted URLs. Empty accepts any link.
    pub link_suffixes: Vec<String>,
    pub page_size: usize,
    pub batch_size: usize,
    pub export_capacity: usize,
    pub require_landscape: bool,
    pub preserve_rejections: bool,
    pub mode: SelectionMode,
    pub ranking: RankingStrategy,
    pub layout: CanvasLayout,
    pub placeholder_color: [u8; 4],
    pub filename: String,
    pub preview_size: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            intake_limit: 54,
            link_suffixes: IMAGE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            page_size: 18,
            batch_size: 18,
            export_capacity: 12,
            require_landscape: true,
            preserve_rejections: true,
            mode: SelectionMode::RejectOnly,
            ranking: RankingStrategy::Rating,
            layout: CanvasLayout::default(),
            placeholder_color: [180, 180, 180, 255],
            filename: "contact_sheet.png".to_string(),
            preview_size: 300,
        }
    }
}

impl SheetConfig {
    /// Five-tile one-shot sheet: no review, whatever was fetched is used.
    pub fn lean() -> Self {
        Self {
            export_capacity: 5,
            require_landscape: false,
            ranking: RankingStrategy::Earnings,
            layout: CanvasLayout::lean(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ContactSheetError> {
        let layout = &self.layout;
        if layout.columns == 0 || layout.rows == 0 {
            return Err(ContactSheetError::Validation(
                "layout needs at least one column and one row".to_string(),
            ));
        }
        if layout.tile_width() == 0 || layout.tile_height() == 0 {
            return Err(ContactSheetError::Validation(format!(
                "canvas {}x{} leaves no room for {}x{} tiles with padding {}",
                layout.canvas_width, layout.canvas_height, layout.columns, layout.rows, layout.padding
            )));
        }
        if self.page_size == 0 || self.batch_size == 0 {
            return Err(ContactSheetError::Validation(
                "page_size and batch_size must be positive".to_string(),
            ));
        }
        if self.export_capacity == 0 || self.export_capacity > layout.capacity() {
            return Err(ContactSheetError::Validation(format!(
                "export_capacity must be between 1 and {}",
                layout.capacity()
            )));
        }
        if self.intake_limit == 0 {
            return Err(ContactSheetError::Validation(
                "intake_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the pixels for a record come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordSource {
    Url {
        url: String,
    },
    Upload {
        filename: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl RecordSource {
    pub fn is_empty(&self) -> bool {
        match self {
            RecordSource::Url { url } => url.trim().is_empty(),
            RecordSource::Upload { data, .. } => data.is_empty(),
        }
    }

    /// Short human-readable label, never the raw bytes.
    pub fn label(&self) -> String {
        match self {
            RecordSource::Url { url } => url.clone(),
            RecordSource::Upload { filename, .. } => filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub source: RecordSource,
    #[serde(default)]
    pub sales_count: f64,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default)]
    pub rating: u8,
}

impl ImageRecord {
    pub fn from_url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: RecordSource::Url { url: url.into() },
            sales_count: 0.0,
            total_earnings: 0.0,
            rating: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Unseen,
    Active,
    Selected,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Every active record is exported; the user only removes.
    #[default]
    RejectOnly,
    /// Only explicitly checked records are exported.
    Checkbox,
}

/// Fixed canvas geometry of a contact sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub padding: u32,
}

impl Default for CanvasLayout {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 960,
            columns: 4,
            rows: 3,
            padding: 10,
        }
    }
}

impl CanvasLayout {
    /// 1080x720 canvas used by the one-shot sheets.
    pub fn lean() -> Self {
        Self {
            canvas_width: 1080,
            canvas_height: 720,
            columns: 3,
            rows: 2,
            padding: 10,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.columns as usize) * (self.rows as usize)
    }

    pub fn tile_width(&self) -> u32 {
        let gaps = (self.columns + 1).saturating_mul(self.padding);
        self.canvas_width.saturating_sub(gaps) / self.columns.max(1)
    }

    pub fn tile_height(&self) -> u32 {
        let gaps = (self.rows + 1).saturating_mul(self.padding);
        self.canvas_height.saturating_sub(gaps) / self.rows.max(1)
    }

    /// Top-left corner of tile `index`, row-major.
    pub fn tile_origin(&self, index: usize) -> (u32, u32) {
        let columns = self.columns.max(1) as usize;
        let col = (index % columns) as u32;
        let row = (index / columns) as u32;
        (
            self.padding + col * (self.tile_width() + self.padding),
            self.padding + row * (self.tile_height() + self.padding),
        )
    }

    pub fn tile_rect(&self, index: usize) -> TileRect {
        let (x, y) = self.tile_origin(index);
        TileRect {
            x,
            y,
            width: self.tile_width(),
            height: self.tile_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
impl TileRect {
    pub fn overlaps(&self, other: &TileRect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// The three accepted intake shapes.
#[derive(Debug, Clone)]
pub enum SheetInput {
    Tabular(Vec<u8>),
    UrlList(String),
    Uploads(Vec<UploadedFile>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExportStatus {
    Ready { count: usize },
    OverCapacity { count: usize, excess: usize },
    Empty,
}

impl ExportStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ExportStatus::Ready { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
    pub id: String,
    pub source: String,
    pub rating: u8,
    pub status: RecordStatus,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub offset: usize,
    pub page_size: usize,
    pub page_number: usize,
    pub page_count: usize,
    pub records: Vec<RecordView>,
}

/// Everything a renderer needs after one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub mode: SelectionMode,
    pub page: PageView,
    pub visible_count: usize,
    pub exportable_count: usize,
    pub selected_count: usize,
    pub export_status: ExportStatus,
    pub confirmed: Vec<String>,
    pub intake_exhausted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContactSheet {
    pub filename: String,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

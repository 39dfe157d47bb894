// src/services/selection.rs
use crate::errors::ContactSheetError;
use crate::models::{ExportStatus, ImageRecord, RecordStatus, SelectionMode};
use crate::services::fetcher::ImageFetcher;
use crate::services::image_processor::ImageProcessor;
use image::GenericImageView;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A record that passed fetch and the landscape gate and sits in the review grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadedRecord {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

/// Review state for one session.
///
/// Records move `unseen -> active -> {selected | rejected}`. `loaded` keeps
/// admission order, which is rank order because the read cursor only moves
/// forward through `ranked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionState {
    mode: SelectionMode,
    ranked: Vec<ImageRecord>,
    statuses: HashMap<String, RecordStatus>,
    loaded: Vec<LoadedRecord>,
    cursor: usize,
    offset: usize,
    page_size: usize,
    capacity: usize,
    confirmed: Vec<String>,
}

impl SelectionState {
    pub fn new(
        ranked: Vec<ImageRecord>,
        mode: SelectionMode,
        page_size: usize,
        capacity: usize,
    ) -> Self {
        let statuses = ranked
            .iter()
            .map(|r| (r.id.clone(), RecordStatus::Unseen))
            .collect();
        Self {
            mode,
            ranked,
            statuses,
            loaded: Vec::new(),
            cursor: 0,
            offset: 0,
            page_size: page_size.max(1),
            capacity,
            confirmed: Vec::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_records(&self) -> usize {
        self.ranked.len()
    }

    pub fn record(&self, id: &str) -> Option<&ImageRecord> {
        self.ranked.iter().find(|r| r.id == id)
    }

    pub fn status(&self, id: &str) -> Option<RecordStatus> {
        self.statuses.get(id).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.ranked.len()
    }

    pub fn loaded(&self) -> &[LoadedRecord] {
        &self.loaded
    }

    /// Walk the ranked list from the cursor, fetching each unseen record,
    /// until `n` new records are admitted or the list runs out.
    pub async fn load_next_batch(
        &mut self,
        n: usize,
        fetcher: &dyn ImageFetcher,
        processor: &ImageProcessor,
        require_landscape: bool,
    ) -> usize {
        let mut admitted = 0;
        while admitted < n && !self.is_exhausted() {
            let record = self.ranked[self.cursor].clone();
            self.cursor += 1;

            if self.status(&record.id) != Some(RecordStatus::Unseen) {
                continue;
            }

            match fetcher.fetch(&record).await {
                Ok(img) if processor.admit(&img, require_landscape) => {
                    let (width, height) = img.dimensions();
                    self.admit(&record.id, width, height);
                    admitted += 1;
                }
                Ok(img) => {
                    debug!(
                        "Excluding record {}: {}x{} is not landscape",
                        record.id,
                        img.width(),
                        img.height()
                    );
                    self.exclude(&record.id);
                }
                Err(e) => {
                    warn!("Excluding record {}: {}", record.id, e);
                    self.exclude(&record.id);
                }
            }
        }
        // newly active records join the reject-only export set
        if admitted > 0 && self.mode == SelectionMode::RejectOnly {
            self.invalidate_confirmed();
        }
        admitted
    }

    fn admit(&mut self, id: &str, width: u32, height: u32) {
        self.statuses.insert(id.to_string(), RecordStatus::Active);
        self.loaded.push(LoadedRecord {
            id: id.to_string(),
            width,
            height,
        });
    }

    // never entered the grid, so a non-preserving reset leaves it out too
    fn exclude(&mut self, id: &str) {
        self.statuses.insert(id.to_string(), RecordStatus::Rejected);
    }

    fn loaded_status(&self, id: &str) -> Result<RecordStatus, ContactSheetError> {
        let status = self
            .status(id)
            .ok_or_else(|| ContactSheetError::UnknownRecord(id.to_string()))?;
        if !self.loaded.iter().any(|r| r.id == id) {
            return Err(match status {
                RecordStatus::Rejected => {
                    ContactSheetError::InvalidTransition(format!("record {} was excluded", id))
                }
                _ => ContactSheetError::InvalidTransition(format!(
                    "record {} has not been loaded",
                    id
                )),
            });
        }
        Ok(status)
    }

    /// Rejecting an already rejected record is a no-op.
    pub fn reject(&mut self, id: &str) -> Result<(), ContactSheetError> {
        match self.loaded_status(id)? {
            RecordStatus::Rejected => return Ok(()),
            RecordStatus::Active | RecordStatus::Selected => {
                self.statuses.insert(id.to_string(), RecordStatus::Rejected);
            }
            RecordStatus::Unseen => {
                return Err(ContactSheetError::InvalidTransition(format!(
                    "record {} has not been loaded",
                    id
                )));
            }
        }
        self.confirmed.retain(|c| c != id);
        self.clamp_offset();
        Ok(())
    }

    /// Checkbox mode only: flip `active <-> selected`, returning the new status.
    pub fn toggle_select(&mut self, id: &str) -> Result<RecordStatus, ContactSheetError> {
        if self.mode != SelectionMode::Checkbox {
            return Err(ContactSheetError::InvalidTransition(
                "selection toggling needs checkbox mode".to_string(),
            ));
        }
        let next = match self.loaded_status(id)? {
            RecordStatus::Active => {
                self.invalidate_confirmed();
                RecordStatus::Selected
            }
            RecordStatus::Selected => {
                self.confirmed.retain(|c| c != id);
                RecordStatus::Active
            }
            RecordStatus::Rejected | RecordStatus::Unseen => {
                return Err(ContactSheetError::InvalidTransition(format!(
                    "record {} cannot be selected",
                    id
                )));
            }
        };
        self.statuses.insert(id.to_string(), next);
        Ok(next)
    }

    /// Loaded records that have not been rejected, in rank order.
    pub fn visible(&self) -> Vec<&LoadedRecord> {
        self.loaded
            .iter()
            .filter(|r| self.status(&r.id) != Some(RecordStatus::Rejected))
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| **s == RecordStatus::Selected)
            .count()
    }

    pub fn exportable_ids(&self) -> Vec<String> {
        let wanted = match self.mode {
            SelectionMode::RejectOnly => RecordStatus::Active,
            SelectionMode::Checkbox => RecordStatus::Selected,
        };
        self.loaded
            .iter()
            .filter(|r| self.status(&r.id) == Some(wanted))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn export_status(&self) -> ExportStatus {
        let count = self.exportable_ids().len();
        if count == 0 {
            ExportStatus::Empty
        } else if count > self.capacity {
            ExportStatus::OverCapacity {
                count,
                excess: count - self.capacity,
            }
        } else {
            ExportStatus::Ready { count }
        }
    }

    /// Capture the exportable records as the export set.
    pub fn confirm(&mut self) -> Result<&[String], ContactSheetError> {
        match self.export_status() {
            ExportStatus::Empty => Err(ContactSheetError::ExportEmpty),
            ExportStatus::OverCapacity { excess, .. } => {
                Err(ContactSheetError::OverCapacity { excess })
            }
            ExportStatus::Ready { .. } => {
                let mut ids = self.exportable_ids();
                ids.truncate(self.capacity);
                self.confirmed = ids;
                self.offset = 0;
                Ok(&self.confirmed)
            }
        }
    }

    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    fn invalidate_confirmed(&mut self) {
        if !self.confirmed.is_empty() {
            debug!("Export set changed, dropping {} confirmed", self.confirmed.len());
            self.confirmed.clear();
        }
    }

    /// The confirmed records, provided the current exportable set still fits
    /// the sheet. Nothing confirmed counts as nothing to export.
    pub fn export_records(&self) -> Result<Vec<ImageRecord>, ContactSheetError> {
        match self.export_status() {
            ExportStatus::Empty => Err(ContactSheetError::ExportEmpty),
            ExportStatus::OverCapacity { excess, .. } => {
                Err(ContactSheetError::OverCapacity { excess })
            }
            ExportStatus::Ready { .. } if self.confirmed.is_empty() => {
                Err(ContactSheetError::ExportEmpty)
            }
            ExportStatus::Ready { .. } => Ok(self
                .confirmed
                .iter()
                .filter_map(|id| self.record(id).cloned())
                .collect()),
        }
    }

    /// Return every loaded record to `active`. Rejections survive only when
    /// `preserve_rejections` is set. Clears the confirmed set and the page offset.
    pub fn reset(&mut self, preserve_rejections: bool) {
        for record in &self.loaded {
            let Some(status) = self.statuses.get_mut(&record.id) else {
                continue;
            };
            match *status {
                RecordStatus::Rejected if preserve_rejections => {}
                _ => *status = RecordStatus::Active,
            }
        }
        self.confirmed.clear();
        self.offset = 0;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn max_offset(&self) -> usize {
        self.visible().len().saturating_sub(self.page_size)
    }

    pub fn set_offset(&mut self, offset: usize) -> usize {
        self.offset = offset.min(self.max_offset());
        self.offset
    }

    pub fn next_page(&mut self) -> usize {
        self.set_offset(self.offset.saturating_add(self.page_size))
    }

    pub fn prev_page(&mut self) -> usize {
        self.set_offset(self.offset.saturating_sub(self.page_size))
    }

    fn clamp_offset(&mut self) {
        self.set_offset(self.offset);
    }

    pub fn page(&self) -> Vec<&LoadedRecord> {
        self.visible()
            .into_iter()
            .skip(self.offset)
            .take(self.page_size)
            .collect()
    }
}

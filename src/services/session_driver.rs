// src/services/session_driver.rs
use crate::config::SheetConfig;
use crate::errors::ContactSheetError;
use crate::models::{ContactSheet, PageView, RecordView, SheetInput, SessionView};
use crate::services::compositor::Compositor;
use crate::services::fetcher::{ImageFetcher, fetch_all};
use crate::services::image_processor::ImageProcessor;
use crate::services::normalizer::Normalizer;
use crate::services::selection::SelectionState;
use crate::services::session_store::Session;
use image::DynamicImage;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    To(usize),
    Next,
    Prev,
}

/// Command handlers for the review workflow. Each takes the session it acts on
/// and returns the view to render next; the driver itself holds no session state.
pub struct SessionDriver {
    fetcher: Arc<dyn ImageFetcher>,
    processor: ImageProcessor,
    base_links: bool,
}

impl SessionDriver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            processor: ImageProcessor::new(),
            base_links: false,
        }
    }

    /// Intake links are base URLs the fetcher extends, so they carry no
    /// image suffix and the suffix filter is skipped.
    pub fn with_base_links(mut self, base_links: bool) -> Self {
        self.base_links = base_links;
        self
    }

    fn normalizer(&self, config: &SheetConfig) -> Normalizer {
        let suffixes = if self.base_links {
            Vec::new()
        } else {
            config.link_suffixes.clone()
        };
        Normalizer::new(config.intake_limit).with_link_suffixes(suffixes)
    }

    /// Normalize and rank the input, then load the first batch for review.
    pub async fn start(
        &self,
        input: SheetInput,
        config: SheetConfig,
    ) -> Result<(Session, SessionView), ContactSheetError> {
        config.validate()?;
        let records = self.normalizer(&config).normalize(input)?;
        let ranked = config.ranking.rank(records);

        let mut session = Session {
            id: Uuid::new_v4(),
            selection: SelectionState::new(
                ranked,
                config.mode,
                config.page_size,
                config.export_capacity,
            ),
            config,
            created_at: chrono::Utc::now(),
        };
        info!(
            "Started session {} with {} ranked records",
            session.id,
            session.selection.total_records()
        );

        let batch = session.config.batch_size;
        let view = self.on_load_more(&mut session, batch).await;
        Ok((session, view))
    }

    pub async fn on_load_more(&self, session: &mut Session, n: usize) -> SessionView {
        let admitted = session
            .selection
            .load_next_batch(
                n,
                self.fetcher.as_ref(),
                &self.processor,
                session.config.require_landscape,
            )
            .await;
        info!("Session {}: admitted {} records", session.id, admitted);
        self.view(session)
    }

    pub fn on_reject(
        &self,
        session: &mut Session,
        record_id: &str,
    ) -> Result<SessionView, ContactSheetError> {
        session.selection.reject(record_id)?;
        Ok(self.view(session))
    }

    pub fn on_select(
        &self,
        session: &mut Session,
        record_id: &str,
    ) -> Result<SessionView, ContactSheetError> {
        session.selection.toggle_select(record_id)?;
        Ok(self.view(session))
    }

    pub fn on_confirm(&self, session: &mut Session) -> Result<SessionView, ContactSheetError> {
        let count = session.selection.confirm()?.len();
        info!("Session {}: confirmed {} selects", session.id, count);
        Ok(self.view(session))
    }

    pub fn on_reset(&self, session: &mut Session) -> SessionView {
        session
            .selection
            .reset(session.config.preserve_rejections);
        self.view(session)
    }

    pub fn on_page(&self, session: &mut Session, page: PageMove) -> SessionView {
        match page {
            PageMove::To(offset) => session.selection.set_offset(offset),
            PageMove::Next => session.selection.next_page(),
            PageMove::Prev => session.selection.prev_page(),
        };
        self.view(session)
    }

    /// Composite the confirmed selects. Records that fail to fetch now get a
    /// placeholder tile instead of failing the export.
    pub async fn on_export(&self, session: &Session) -> Result<ContactSheet, ContactSheetError> {
        let records = session.selection.export_records()?;
        let images = fetch_all(self.fetcher.as_ref(), &records).await;
        self.render(images, &session.config)
    }

    /// One-shot sheet with no review: rank, keep the top `export_capacity`,
    /// composite whatever could be fetched. With the landscape gate on,
    /// non-landscape images drop out and lower-ranked ones move up.
    pub async fn quick_sheet(
        &self,
        input: SheetInput,
        config: &SheetConfig,
    ) -> Result<ContactSheet, ContactSheetError> {
        config.validate()?;
        let records = self.normalizer(config).normalize(input)?;
        let mut ranked = config.ranking.rank(records);

        let images = if config.require_landscape {
            let mut images: Vec<_> = fetch_all(self.fetcher.as_ref(), &ranked)
                .await
                .into_iter()
                .filter(|img| {
                    img.as_ref()
                        .is_none_or(|i| self.processor.admit(i, true))
                })
                .collect();
            images.truncate(config.export_capacity);
            images
        } else {
            ranked.truncate(config.export_capacity);
            fetch_all(self.fetcher.as_ref(), &ranked).await
        };

        if images.is_empty() {
            return Err(ContactSheetError::ExportEmpty);
        }
        self.render(images, config)
    }

    pub async fn thumbnail(
        &self,
        session: &Session,
        record_id: &str,
    ) -> Result<Vec<u8>, ContactSheetError> {
        if !session
            .selection
            .loaded()
            .iter()
            .any(|r| r.id == record_id)
        {
            return Err(ContactSheetError::UnknownRecord(record_id.to_string()));
        }
        let record = session
            .selection
            .record(record_id)
            .ok_or_else(|| ContactSheetError::UnknownRecord(record_id.to_string()))?;

        let img = self.fetcher.fetch(record).await.map_err(|e| {
            ContactSheetError::ImageProcessing(format!("Could not fetch {}: {}", record_id, e))
        })?;
        self.processor.preview_png(&img, session.config.preview_size)
    }

    fn render(
        &self,
        images: Vec<Option<DynamicImage>>,
        config: &SheetConfig,
    ) -> Result<ContactSheet, ContactSheetError> {
        let tiles = images.len().min(config.layout.capacity());
        let missing = images[..tiles].iter().filter(|i| i.is_none()).count();
        let canvas = Compositor::new(config.placeholder_color).composite(&images, &config.layout);
        info!(
            "Composited {} tiles ({} placeholders) onto {}x{}",
            tiles,
            missing,
            canvas.width(),
            canvas.height()
        );

        let data = self.processor.encode_png(&DynamicImage::ImageRgba8(canvas))?;
        Ok(ContactSheet {
            filename: config.filename.clone(),
            mime: "image/png",
            data,
        })
    }

    pub fn view(&self, session: &Session) -> SessionView {
        let selection = &session.selection;
        let page_size = selection.page_size();
        let visible_count = selection.visible().len();

        let records = selection
            .page()
            .into_iter()
            .filter_map(|loaded| {
                let record = selection.record(&loaded.id)?;
                Some(RecordView {
                    id: loaded.id.clone(),
                    source: record.source.label(),
                    rating: record.rating,
                    status: selection.status(&loaded.id)?,
                    width: loaded.width,
                    height: loaded.height,
                })
            })
            .collect();

        SessionView {
            session_id: session.id,
            mode: selection.mode(),
            page: PageView {
                offset: selection.offset(),
                page_size,
                page_number: selection.offset() / page_size + 1,
                page_count: visible_count.div_ceil(page_size),
                records,
            },
            visible_count,
            exportable_count: selection.exportable_ids().len(),
            selected_count: selection.selected_count(),
            export_status: selection.export_status(),
            confirmed: selection.confirmed().to_vec(),
            intake_exhausted: selection.is_exhausted(),
            created_at: session.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExportStatus, SelectionMode};
    use crate::services::fetcher::stub::StubFetcher;
    use image::{GenericImageView, Rgba};

    fn driver() -> SessionDriver {
        SessionDriver::new(Arc::new(StubFetcher::default()))
    }

    // the stub keys off the record id, which only a table can set
    fn table(ids: &[&str]) -> SheetInput {
        let mut csv = String::from("Media Number,Media Link,Your Share,Sales Count\n");
        for id in ids {
            csv.push_str(&format!("{},https://img.example/{}.jpg,0,0\n", id, id));
        }
        SheetInput::Tabular(csv.into_bytes())
    }

    fn landscape(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("land-{}", i)).collect()
    }

    #[tokio::test]
    async fn start_loads_first_batch() {
        let ids = landscape(20);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (session, view) = driver()
            .start(table(&refs), SheetConfig::default())
            .await
            .unwrap();

        assert_eq!(view.session_id, session.id);
        assert_eq!(view.visible_count, 18);
        assert_eq!(view.page.records.len(), 18);
        assert_eq!(view.page.page_count, 1);
        assert!(!view.intake_exhausted);
        assert_eq!(
            view.export_status,
            ExportStatus::OverCapacity {
                count: 18,
                excess: 6
            }
        );
    }

    #[tokio::test]
    async fn start_with_nothing_usable_is_input_empty() {
        let err = driver()
            .start(
                SheetInput::UrlList("https://a.example/x.png".into()),
                SheetConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContactSheetError::InputEmpty));
    }

    #[tokio::test]
    async fn review_confirm_export_flow() {
        let driver = driver();
        let mut ids = landscape(13);
        ids.insert(4, "broken-x".to_string());
        ids.insert(6, "port-y".to_string());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut session, view) = driver.start(table(&refs), SheetConfig::default()).await.unwrap();
        assert_eq!(view.visible_count, 13);
        assert!(view.intake_exhausted);

        assert!(matches!(
            driver.on_confirm(&mut session),
            Err(ContactSheetError::OverCapacity { excess: 1 })
        ));
        assert!(matches!(
            driver.on_export(&session).await,
            Err(ContactSheetError::OverCapacity { excess: 1 })
        ));

        let view = driver.on_reject(&mut session, "land-0").unwrap();
        assert_eq!(view.export_status, ExportStatus::Ready { count: 12 });
        let view = driver.on_confirm(&mut session).unwrap();
        assert_eq!(view.confirmed.len(), 12);
        assert_eq!(view.confirmed[0], "land-1");

        let sheet = driver.on_export(&session).await.unwrap();
        assert_eq!(sheet.filename, "contact_sheet.png");
        assert_eq!(sheet.mime, "image/png");
        let png = image::load_from_memory(&sheet.data).unwrap();
        assert_eq!(png.dimensions(), (1280, 960));
        let layout = session.config.layout;
        for i in 0..12 {
            let (x, y) = layout.tile_origin(i);
            assert_eq!(png.get_pixel(x, y), Rgba([200, 10, 10, 255]));
        }
    }

    #[tokio::test]
    async fn export_follows_the_current_exportable_set() {
        let driver = driver();
        let config = SheetConfig {
            batch_size: 10,
            ..SheetConfig::default()
        };
        let ids = landscape(20);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut session, _) = driver.start(table(&refs), config).await.unwrap();
        driver.on_confirm(&mut session).unwrap();
        assert!(driver.on_export(&session).await.is_ok());

        let view = driver.on_load_more(&mut session, 10).await;
        assert_eq!(
            view.export_status,
            ExportStatus::OverCapacity {
                count: 20,
                excess: 8
            }
        );
        assert!(view.confirmed.is_empty());
        assert!(matches!(
            driver.on_export(&session).await,
            Err(ContactSheetError::OverCapacity { excess: 8 })
        ));

        for id in &ids[..8] {
            driver.on_reject(&mut session, id).unwrap();
        }
        assert!(matches!(
            driver.on_export(&session).await,
            Err(ContactSheetError::ExportEmpty)
        ));
        driver.on_confirm(&mut session).unwrap();
        assert!(driver.on_export(&session).await.is_ok());
    }

    #[tokio::test]
    async fn checkbox_select_after_confirm_blocks_stale_export() {
        let driver = driver();
        let config = SheetConfig {
            mode: SelectionMode::Checkbox,
            ..SheetConfig::default()
        };
        let ids = landscape(4);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut session, _) = driver.start(table(&refs), config).await.unwrap();
        driver.on_select(&mut session, "land-1").unwrap();
        driver.on_confirm(&mut session).unwrap();

        let view = driver.on_select(&mut session, "land-3").unwrap();
        assert_eq!(view.export_status, ExportStatus::Ready { count: 2 });
        assert!(matches!(
            driver.on_export(&session).await,
            Err(ContactSheetError::ExportEmpty)
        ));

        driver.on_confirm(&mut session).unwrap();
        let sheet = driver.on_export(&session).await.unwrap();
        let png = image::load_from_memory(&sheet.data).unwrap();
        let (x, y) = session.config.layout.tile_origin(1);
        assert_eq!(png.get_pixel(x, y), Rgba([200, 10, 10, 255]));
        let (x, y) = session.config.layout.tile_origin(2);
        assert_eq!(png.get_pixel(x, y)[3], 0);
    }

    #[tokio::test]
    async fn base_link_tables_start_when_fetcher_appends_a_path() {
        let csv = "Media Number,Media Link\n\
                   land-0,https://host.example/media/42/\n\
                   land-1,https://host.example/media/43\n";
        let input = || SheetInput::Tabular(csv.as_bytes().to_vec());

        assert!(matches!(
            driver().start(input(), SheetConfig::default()).await,
            Err(ContactSheetError::InputEmpty)
        ));

        let (_, view) = driver()
            .with_base_links(true)
            .start(input(), SheetConfig::default())
            .await
            .unwrap();
        assert_eq!(view.visible_count, 2);
    }

    #[tokio::test]
    async fn reset_follows_config_flag() {
        for preserve in [true, false] {
            let driver = driver();
            let config = SheetConfig {
                preserve_rejections: preserve,
                ..SheetConfig::default()
            };
            let ids = landscape(3);
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let (mut session, _) = driver.start(table(&refs), config).await.unwrap();
            driver.on_reject(&mut session, "land-1").unwrap();

            let view = driver.on_reset(&mut session);
            assert_eq!(view.visible_count, if preserve { 2 } else { 3 });
        }
    }

    #[tokio::test]
    async fn checkbox_mode_views_track_selection() {
        let driver = driver();
        let config = SheetConfig {
            mode: SelectionMode::Checkbox,
            ..SheetConfig::default()
        };
        let ids = landscape(4);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut session, view) = driver.start(table(&refs), config).await.unwrap();
        assert_eq!(view.export_status, ExportStatus::Empty);

        let view = driver.on_select(&mut session, "land-2").unwrap();
        assert_eq!(view.export_status, ExportStatus::Ready { count: 1 });
        assert_eq!(view.selected_count, 1);
        driver.on_confirm(&mut session).unwrap();
        assert_eq!(session.selection.confirmed(), ["land-2"]);
    }

    #[tokio::test]
    async fn paging_moves_over_visible_records() {
        let driver = driver();
        let ids = landscape(30);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut session, _) = driver.start(table(&refs), SheetConfig::default()).await.unwrap();
        let view = driver.on_load_more(&mut session, 18).await;
        assert_eq!(view.visible_count, 30);

        let view = driver.on_page(&mut session, PageMove::Next);
        assert_eq!(view.page.offset, 12);
        assert_eq!(view.page.page_count, 2);
        assert_eq!(view.page.records[0].id, "land-12");

        let view = driver.on_page(&mut session, PageMove::To(3));
        assert_eq!(view.page.offset, 3);
        let view = driver.on_page(&mut session, PageMove::Prev);
        assert_eq!(view.page.offset, 0);
    }

    #[tokio::test]
    async fn quick_sheet_uses_placeholders_for_failures() {
        let config = SheetConfig::lean();
        let sheet = driver()
            .quick_sheet(table(&["port-a", "broken-b", "square-c"]), &config)
            .await
            .unwrap();
        let png = image::load_from_memory(&sheet.data).unwrap();
        assert_eq!(png.dimensions(), (1080, 720));

        let layout = config.layout;
        let (x0, y0) = layout.tile_origin(0);
        assert_eq!(png.get_pixel(x0, y0), Rgba([10, 200, 10, 255]));
        let (x1, y1) = layout.tile_origin(1);
        assert_eq!(png.get_pixel(x1, y1), Rgba([180, 180, 180, 255]));
        let (x3, y3) = layout.tile_origin(3);
        assert_eq!(png.get_pixel(x3, y3)[3], 0);
    }

    #[tokio::test]
    async fn quick_sheet_with_gate_promotes_lower_ranked_landscapes() {
        let config = SheetConfig {
            require_landscape: true,
            ..SheetConfig::lean()
        };
        let sheet = driver()
            .quick_sheet(table(&["port-a", "broken-b", "land-c"]), &config)
            .await
            .unwrap();
        let png = image::load_from_memory(&sheet.data).unwrap();
        let (x0, y0) = config.layout.tile_origin(0);
        assert_eq!(png.get_pixel(x0, y0), Rgba([180, 180, 180, 255]));
        let (x1, y1) = config.layout.tile_origin(1);
        assert_eq!(png.get_pixel(x1, y1), Rgba([200, 10, 10, 255]));
    }

    #[tokio::test]
    async fn quick_sheet_respects_capacity() {
        let config = SheetConfig::lean();
        let ids = landscape(9);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let sheet = driver().quick_sheet(table(&refs), &config).await.unwrap();
        let png = image::load_from_memory(&sheet.data).unwrap();
        let (x5, y5) = config.layout.tile_origin(5);
        assert_eq!(png.get_pixel(x5, y5)[3], 0);
        let (x4, y4) = config.layout.tile_origin(4);
        assert_eq!(png.get_pixel(x4, y4)[3], 255);
    }

    #[tokio::test]
    async fn thumbnail_only_for_loaded_records() {
        let driver = driver();
        let (session, _) = driver
            .start(table(&["land-0", "port-1"]), SheetConfig::default())
            .await
            .unwrap();
        let png = driver.thumbnail(&session, "land-0").await.unwrap();
        assert_eq!(
            image::load_from_memory(&png).unwrap().dimensions(),
            (40, 30)
        );
        assert!(matches!(
            driver.thumbnail(&session, "port-1").await,
            Err(ContactSheetError::UnknownRecord(_))
        ));
    }
}

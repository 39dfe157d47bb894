// src/services/normalizer.rs
use crate::errors::ContactSheetError;
use crate::models::{ImageRecord, RecordSource, SheetInput, UploadedFile};
use log::{debug, info};

pub const IMAGE_SUFFIXES: [&str; 2] = [".jpg", ".jpeg"];
const URL_SCHEME_MARKER: &str = "http";

/// Header spellings seen in marketplace exports, mapped to the field they feed.
const COLUMN_RENAMES: &[(&str, Column)] = &[
    ("Media Link", Column::Link),
    ("URL", Column::Link),
    ("Url", Column::Link),
    ("url", Column::Link),
    ("Link", Column::Link),
    ("link", Column::Link),
    ("Image URL", Column::Link),
    ("Your Share", Column::Earnings),
    ("Total Earnings", Column::Earnings),
    ("Earnings", Column::Earnings),
    ("earnings", Column::Earnings),
    ("Sales Count", Column::Sales),
    ("Sales", Column::Sales),
    ("sales_count", Column::Sales),
    ("Media Number", Column::Id),
    ("Media ID", Column::Id),
    ("ID", Column::Id),
    ("Id", Column::Id),
    ("id", Column::Id),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Link,
    Earnings,
    Sales,
    Id,
}

#[derive(Debug, Default)]
struct ColumnMap {
    link: Option<usize>,
    earnings: Option<usize>,
    sales: Option<usize>,
    id: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = Self::default();
        for (index, header) in headers.iter().enumerate() {
            let Some((_, column)) = COLUMN_RENAMES.iter().find(|(name, _)| *name == header.trim())
            else {
                continue;
            };
            let slot = match column {
                Column::Link => &mut map.link,
                Column::Earnings => &mut map.earnings,
                Column::Sales => &mut map.sales,
                Column::Id => &mut map.id,
            };
            // first matching column wins
            slot.get_or_insert(index);
        }
        map
    }
}

pub struct Normalizer {
    intake_limit: usize,
    link_suffixes: Vec<String>,
}

impl Normalizer {
    pub fn new(intake_limit: usize) -> Self {
        Self {
            intake_limit,
            link_suffixes: IMAGE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Links must end in one of `suffixes`. An empty list accepts any link,
    /// for sources whose links are base URLs resolved at fetch time.
    pub fn with_link_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.link_suffixes = suffixes;
        self
    }

    pub fn normalize(&self, input: SheetInput) -> Result<Vec<ImageRecord>, ContactSheetError> {
        let mut records = match input {
            SheetInput::Tabular(data) => self.from_table(&data)?,
            SheetInput::UrlList(text) => self.from_url_list(&text),
            SheetInput::Uploads(files) => self.from_uploads(files),
        };
        records.retain(|r| !r.source.is_empty());

        if records.is_empty() {
            return Err(ContactSheetError::InputEmpty);
        }

        info!("Normalized {} image records", records.len());
        Ok(records)
    }

    fn from_table(&self, data: &[u8]) -> Result<Vec<ImageRecord>, ContactSheetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers = reader
            .headers()
            .map_err(|e| ContactSheetError::Input(format!("Unreadable CSV header: {}", e)))?
            .clone();
        let columns = ColumnMap::from_headers(&headers);
        let link_column = columns.link.ok_or_else(|| {
            ContactSheetError::Input(
                "CSV has no link column (e.g. \"Media Link\" or \"URL\")".to_string(),
            )
        })?;

        let mut records = Vec::new();
        for (row_index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| ContactSheetError::Input(format!("Bad CSV row: {}", e)))?;
            let link = row.get(link_column).unwrap_or("").to_string();
            if !self.is_image_link(&link) || !link.contains(URL_SCHEME_MARKER) {
                debug!("Dropping row {} with link {:?}", row_index, link);
                continue;
            }

            let id = columns
                .id
                .and_then(|c| row.get(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| row_index.to_string());

            records.push(ImageRecord {
                sales_count: number_at(&row, columns.sales),
                total_earnings: number_at(&row, columns.earnings),
                ..ImageRecord::from_url(id, link)
            });

            if records.len() == self.intake_limit {
                break;
            }
        }
        Ok(records)
    }

    fn from_url_list(&self, text: &str) -> Vec<ImageRecord> {
        text.lines()
            .map(str::trim)
            .filter(|line| self.is_image_link(line))
            .take(self.intake_limit)
            .enumerate()
            .map(|(index, url)| ImageRecord::from_url(index.to_string(), url))
            .collect()
    }

    fn from_uploads(&self, files: Vec<UploadedFile>) -> Vec<ImageRecord> {
        files
            .into_iter()
            .filter(|f| !f.data.is_empty())
            .take(self.intake_limit)
            .enumerate()
            .inspect(|(_, f)| {
                debug!(
                    "Upload {} ({}, {} bytes)",
                    f.filename,
                    f.content_type,
                    f.data.len()
                )
            })
            .map(|(index, file)| ImageRecord {
                id: index.to_string(),
                source: RecordSource::Upload {
                    filename: file.filename,
                    data: file.data,
                },
                sales_count: 0.0,
                total_earnings: 0.0,
                rating: 0,
            })
            .collect()
    }

    fn is_image_link(&self, link: &str) -> bool {
        !link.is_empty()
            && (self.link_suffixes.is_empty()
                || self.link_suffixes.iter().any(|suffix| link.ends_with(suffix.as_str())))
    }
}

fn number_at(row: &csv::StringRecord, column: Option<usize>) -> f64 {
    column
        .and_then(|c| row.get(c))
        .map(|v| v.replace(['$', ','], ""))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> SheetInput {
        SheetInput::Tabular(csv.as_bytes().to_vec())
    }

    #[test]
    fn tabular_rows_filter_on_suffix_and_scheme() {
        let csv = "Media Number,Media Link,Your Share,Sales Count\n\
                   101,https://cdn.example/a.jpg,250.5,3\n\
                   102,https://cdn.example/b.png,10,1\n\
                   103,ftp-less/c.jpeg,10,1\n\
                   104,https://cdn.example/d.JPG,10,1\n\
                   105,,10,1\n\
                   106,http://cdn.example/e.jpeg,\"$1,200.00\",2\n";
        let records = Normalizer::new(54).normalize(table(csv)).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "106"]);
        assert_eq!(records[0].total_earnings, 250.5);
        assert_eq!(records[0].sales_count, 3.0);
        assert_eq!(records[1].total_earnings, 1200.0);
    }

    #[test]
    fn missing_numeric_columns_default_to_zero() {
        let csv = "URL\nhttps://cdn.example/a.jpg\nhttps://cdn.example/b.jpg\n";
        let records = Normalizer::new(54).normalize(table(csv)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "1");
        assert_eq!(records[1].sales_count, 0.0);
        assert_eq!(records[1].total_earnings, 0.0);
    }

    #[test]
    fn base_url_links_pass_when_suffixes_are_cleared() {
        let csv = "Media Number,Media Link\n\
                   1,https://host.example/media/42/\n\
                   2,host.example/media/43/\n";
        assert!(matches!(
            Normalizer::new(54).normalize(table(csv)),
            Err(ContactSheetError::InputEmpty)
        ));

        let records = Normalizer::new(54)
            .with_link_suffixes(Vec::new())
            .normalize(table(csv))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }

    #[test]
    fn custom_suffixes_replace_the_jpeg_filter() {
        let text = "https://a.example/1.jpg\nhttps://a.example/2.png\n";
        let records = Normalizer::new(54)
            .with_link_suffixes(vec![".png".to_string()])
            .normalize(SheetInput::UrlList(text.to_string()))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source.label(), "https://a.example/2.png");
    }

    #[test]
    fn table_without_link_column_is_malformed() {
        let err = Normalizer::new(54)
            .normalize(table("Name,Price\nx,1\n"))
            .unwrap_err();
        assert!(matches!(err, ContactSheetError::Input(_)));
    }

    #[test]
    fn no_qualifying_rows_is_input_empty() {
        let err = Normalizer::new(54)
            .normalize(table("URL\nhttps://cdn.example/a.gif\n"))
            .unwrap_err();
        assert!(matches!(err, ContactSheetError::InputEmpty));
    }

    #[test]
    fn intake_is_capped() {
        let text: String = (0..80)
            .map(|i| format!("https://cdn.example/{}.jpg\n", i))
            .collect();
        let records = Normalizer::new(54)
            .normalize(SheetInput::UrlList(text))
            .unwrap();
        assert_eq!(records.len(), 54);
        assert_eq!(records[53].id, "53");
    }

    #[test]
    fn pasted_urls_skip_blank_and_non_jpeg_lines() {
        let text = "https://a.example/1.jpg\n\n  https://a.example/2.jpeg  \nhttps://a.example/3.webp\n";
        let records = Normalizer::new(54)
            .normalize(SheetInput::UrlList(text.to_string()))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].source,
            RecordSource::Url {
                url: "https://a.example/2.jpeg".into()
            }
        );
    }

    #[test]
    fn empty_uploads_are_dropped() {
        let files = vec![
            UploadedFile {
                filename: "empty.jpg".into(),
                content_type: "image/jpeg".into(),
                data: vec![],
            },
            UploadedFile {
                filename: "full.jpg".into(),
                content_type: "image/jpeg".into(),
                data: vec![0xFF, 0xD8],
            },
        ];
        let records = Normalizer::new(54)
            .normalize(SheetInput::Uploads(files))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source.label(), "full.jpg");
    }
}

use crate::error::{HarvestError, Result};
use crate::results::ProductRecord;
use std::fs::File;
use std::path::{Path, PathBuf};

const BASE_HEADER: [&str; 7] = [
    "page",
    "title",
    "price",
    "description",
    "reviews",
    "rating",
    "link",
];

/// Append-only CSV store with a per-row durability guarantee.
///
/// `create` always truncates and writes a fresh header; `append` returns only
/// after the row has been flushed and fsynced, so a crash mid-run cannot lose
/// rows already reported as written.
pub struct CsvStore {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    with_screenshot: bool,
    rows: u64,
}

impl CsvStore {
    /// Open the store, truncating any previous file and writing the header.
    pub fn create<P: AsRef<Path>>(path: P, with_screenshot: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header: Vec<&str> = BASE_HEADER.to_vec();
        if with_screenshot {
            header.push("screenshot");
        }
        writer.write_record(&header)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        ::log::info!("CSV store initialized: {}", path.display());
        Ok(Self {
            writer: Some(writer),
            path,
            with_screenshot,
            rows: 0,
        })
    }

    /// Append one record. Durable on disk once this returns Ok.
    pub fn append(&mut self, record: &ProductRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| HarvestError::Config("store is closed".to_string()))?;

        let page = record.page.to_string();
        let rating = record.rating.to_string();
        let mut fields: Vec<&str> = vec![
            &page,
            &record.title,
            &record.price,
            &record.description,
            &record.reviews,
            &rating,
            &record.link,
        ];
        if self.with_screenshot {
            fields.push(&record.screenshot);
        }
        writer.write_record(&fields)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        self.rows += 1;
        Ok(())
    }

    /// Number of rows durably written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Close the store. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
            ::log::info!("CSV store closed: {} ({} rows)", self.path.display(), self.rows);
        }
        Ok(())
    }
}

impl Drop for CsvStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            ::log::warn!("failed to close CSV store: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page: u32, title: &str) -> ProductRecord {
        ProductRecord {
            page,
            title: title.to_string(),
            price: "295.99".to_string(),
            description: "15.6\" FHD".to_string(),
            reviews: "2".to_string(),
            rating: 4,
            link: "https://example.com/p/1".to_string(),
            screenshot: String::new(),
        }
    }

    #[test]
    fn creates_fresh_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        // Pre-existing contents must not survive a create.
        std::fs::write(&path, "stale,data\n1,2\n").unwrap();

        let store = CsvStore::create(&path, false).unwrap();
        drop(store);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "page,title,price,description,reviews,rating,link\n");
    }

    #[test]
    fn screenshot_column_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let store = CsvStore::create(&path, true).unwrap();
        drop(store);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("page,title,price,description,reviews,rating,link,screenshot"));
    }

    #[test]
    fn rows_are_readable_while_store_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut store = CsvStore::create(&path, false).unwrap();
        store.append(&record(1, "Acer Aspire 3")).unwrap();
        store.append(&record(1, "Lenovo V110")).unwrap();

        // Read back without closing: append promises durability per row.
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Acer Aspire 3"));
        assert!(lines[2].contains("Lenovo V110"));
        assert_eq!(store.rows_written(), 2);
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut store = CsvStore::create(&path, false).unwrap();
        let mut rec = record(1, "Asus ROG, 17.3\"");
        rec.description = "GTX 1070, 32GB RAM".to_string();
        store.append(&rec).unwrap();
        store.close().unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "Asus ROG, 17.3\"");
        assert_eq!(&row[3], "GTX 1070, 32GB RAM");
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut store = CsvStore::create(&path, false).unwrap();
        store.append(&record(1, "Acer Aspire 3")).unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(store.append(&record(1, "late")).is_err());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}

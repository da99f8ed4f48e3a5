//! Artifact Store: QR images on disk and the workbook they are appended to
//!
//! The store owns two directory trees:
//!
//! - `<image_dir>/<sanitized payload>.png` for standalone artifacts
//! - `<excel_dir>/<YYYYMMDD>/qr_codes_<YYYYMMDD>[_<HHMMSS>].xlsx` for workbooks
//!
//! The path of the workbook currently appended to is persisted through the
//! [`ConfigStore`] so later runs keep appending until the labels change.

pub mod paths;
pub mod workbook;

use crate::config::{LedgerConfig, StorageOptions, WorkbookOptions};
use crate::config_store::ConfigStore;
use crate::error::{Error, Result};
use crate::qr::QrEncoder;
use crate::record::{FieldLabels, Record, sanitize_file_stem};
use chrono::{Local, NaiveDate, NaiveDateTime};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Scratch directory (inside the dated workbook directory) for resized copies
const THUMBNAIL_DIR: &str = ".thumbnails";

/// A persisted QR image
#[derive(Debug, Clone)]
pub struct QrArtifact {
    /// Where the full-size PNG was written
    pub path: PathBuf,
    /// The rendered image
    pub image: DynamicImage,
}

/// Owner of artifact files and workbooks
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    storage: StorageOptions,
    layout: WorkbookOptions,
    delimiter: char,
    config: ConfigStore,
}

impl ArtifactStore {
    /// Create a store; nothing is touched on disk until an operation needs it.
    pub fn new(storage: StorageOptions, layout: WorkbookOptions, delimiter: char) -> Self {
        let config = ConfigStore::new(storage.state_dir.clone());
        Self {
            storage,
            layout,
            delimiter,
            config,
        }
    }

    /// Create a store from the full runtime configuration
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.storage.clone(),
            config.workbook.clone(),
            config.fields.delimiter,
        )
    }

    /// Config documents backing this store
    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    /// Workbook layout
    pub fn layout(&self) -> &WorkbookOptions {
        &self.layout
    }

    /// Directory for standalone artifacts
    pub fn image_dir(&self) -> &Path {
        &self.storage.image_dir
    }

    /// Create the image directory and today's workbook directory. Idempotent.
    pub fn ensure_directories(&self) -> Result<()> {
        self.ensure_directories_on(Local::now().date_naive())
    }

    /// [`Self::ensure_directories`] for an explicit calendar day
    pub fn ensure_directories_on(&self, date: NaiveDate) -> Result<()> {
        for dir in [
            self.storage.image_dir.clone(),
            paths::dated_dir(&self.storage.excel_dir, date),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Persistence(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Workbook that appends go to, created with `labels` as header if needed.
    ///
    /// The persisted path wins while the file still exists; otherwise today's
    /// workbook path is derived and persisted. A daily workbook left over with
    /// a different header is not reused; a rotated one is started instead.
    pub fn current_workbook_path(&self, labels: &FieldLabels) -> Result<PathBuf> {
        self.current_workbook_path_at(labels, Local::now().naive_local())
    }

    /// [`Self::current_workbook_path`] with an explicit timestamp
    pub fn current_workbook_path_at(
        &self,
        labels: &FieldLabels,
        now: NaiveDateTime,
    ) -> Result<PathBuf> {
        if let Some(path) = self.config.load_workbook_path() {
            if path.is_file() {
                return Ok(path);
            }
            tracing::info!(
                path = %path.display(),
                "Persisted workbook is gone, starting a new one"
            );
        }

        let path = paths::daily_workbook_path(&self.storage.excel_dir, now.date());
        if path.is_file() && !self.header_matches(&path, labels) {
            tracing::info!(
                path = %path.display(),
                "Daily workbook has a different header, rotating"
            );
            return self.rotate_workbook_at(labels, now);
        }
        self.initialize_workbook(&path, labels)?;
        self.config.save_workbook_path(&path)?;
        Ok(path)
    }

    fn header_matches(&self, path: &Path, labels: &FieldLabels) -> bool {
        let mut expected = labels.labels();
        expected.push(self.layout.image_header.clone());
        match workbook::header(path, &self.layout.sheet_title) {
            Ok(header) => header == expected,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable workbook header");
                false
            }
        }
    }

    /// Create the workbook with a header row unless a file already exists at `path`.
    ///
    /// Returns `true` when a new file was written.
    pub fn initialize_workbook(&self, path: &Path, labels: &FieldLabels) -> Result<bool> {
        workbook::create(path, &labels.labels(), &self.layout)
    }

    /// Start a new timestamped workbook for `labels` and make it current.
    ///
    /// The previous workbook is left as it is.
    pub fn rotate_workbook(&self, labels: &FieldLabels) -> Result<PathBuf> {
        self.rotate_workbook_at(labels, Local::now().naive_local())
    }

    /// [`Self::rotate_workbook`] with an explicit timestamp
    pub fn rotate_workbook_at(
        &self,
        labels: &FieldLabels,
        now: NaiveDateTime,
    ) -> Result<PathBuf> {
        let previous = self.config.load_workbook_path();
        let path = paths::rotated_workbook_path(&self.storage.excel_dir, now);

        self.initialize_workbook(&path, labels)?;
        self.config.save_workbook_path(&path)?;

        tracing::info!(
            previous = ?previous,
            current = %path.display(),
            "Rotated workbook after label change"
        );
        Ok(path)
    }

    /// Write the full-size artifact PNG.
    ///
    /// The name is the sanitized payload; when that file already exists a
    /// `_<n>` suffix is added so earlier artifacts are never overwritten.
    pub fn persist_artifact(&self, record: &Record, image: DynamicImage) -> Result<QrArtifact> {
        let stem = sanitize_file_stem(record.payload(), self.delimiter);
        let preferred = self.storage.image_dir.join(format!("{stem}.png"));
        let path = paths::unique_path(&self.storage.image_dir, &stem, "png");

        if path != preferred {
            tracing::warn!(
                preferred = %preferred.display(),
                actual = %path.display(),
                "Artifact name already taken, writing with a suffix"
            );
        }

        image.save(&path).map_err(|e| {
            Error::Persistence(format!("Failed to write {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Saved QR artifact");
        Ok(QrArtifact { path, image })
    }

    /// Append the record's values and a resized copy of its artifact as a new row.
    ///
    /// Returns the row number written. Any failure is reported as
    /// [`Error::Persistence`]; the workbook on disk is unchanged in that case.
    pub fn append_record(
        &self,
        path: &Path,
        record: &Record,
        artifact: &QrArtifact,
    ) -> Result<u32> {
        let thumbnail = self.write_thumbnail(path, artifact)?;
        let result = workbook::append_row(path, record.values(), &thumbnail, &self.layout);

        if let Err(e) = fs::remove_file(&thumbnail) {
            tracing::debug!(path = %thumbnail.display(), error = %e, "Failed to remove thumbnail");
        }

        let row = result?;
        tracing::info!(
            workbook = %path.display(),
            row,
            artifact = %artifact.path.display(),
            "Appended record"
        );
        Ok(row)
    }

    fn write_thumbnail(&self, workbook_path: &Path, artifact: &QrArtifact) -> Result<PathBuf> {
        let dir = workbook_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join(THUMBNAIL_DIR);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Persistence(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let file_name = artifact
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "qr_code.png".into());
        let thumbnail = dir.join(file_name);

        QrEncoder::resized(
            &artifact.image,
            self.layout.image_width,
            self.layout.image_height,
        )
        .save(&thumbnail)
        .map_err(|e| Error::Persistence(format!("Failed to write workbook image: {e}")))?;
        Ok(thumbnail)
    }

    /// Number of data rows (header excluded) in a workbook
    pub fn record_count(&self, path: &Path) -> Result<usize> {
        let rows = workbook::read_rows(path, &self.layout.sheet_title)?;
        Ok(rows.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::from_config(&LedgerConfig::rooted_at(root))
    }

    fn labels() -> FieldLabels {
        FieldLabels::new([("A", "Name"), ("B", "Team"), ("C", "Age")]).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn morning() -> NaiveDateTime {
        day().and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());
        store.ensure_directories_on(day()).unwrap();
        store.ensure_directories_on(day()).unwrap();
        assert!(dir.path().join("qr_code_images").is_dir());
        assert!(dir.path().join("excel_files/20261019").is_dir());
    }

    #[test]
    fn test_current_path_is_derived_then_persisted() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());

        let path = store.current_workbook_path_at(&labels(), morning()).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("excel_files/20261019/qr_codes_20261019.xlsx")
        );
        assert!(path.is_file());
        assert_eq!(store.config_store().load_workbook_path(), Some(path.clone()));

        // A later day keeps appending to the persisted workbook.
        let later = NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(store.current_workbook_path_at(&labels(), later).unwrap(), path);
    }

    #[test]
    fn test_missing_persisted_workbook_falls_back_to_today() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());
        store
            .config_store()
            .save_workbook_path(&dir.path().join("gone.xlsx"))
            .unwrap();

        let path = store.current_workbook_path_at(&labels(), morning()).unwrap();
        assert!(path.ends_with("20261019/qr_codes_20261019.xlsx"));
    }

    #[test]
    fn test_stale_daily_workbook_is_rotated_not_reused() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());

        let daily = store.current_workbook_path_at(&labels(), morning()).unwrap();
        store
            .config_store()
            .save_workbook_path(&dir.path().join("gone.xlsx"))
            .unwrap();

        let renamed = FieldLabels::new([("A", "Full name"), ("B", "Team"), ("C", "Age")]).unwrap();
        let path = store.current_workbook_path_at(&renamed, morning()).unwrap();
        assert_ne!(path, daily);
        assert!(path.ends_with("20261019/qr_codes_20261019_093000.xlsx"));
        assert_eq!(
            workbook::header(&path, "QR Codes").unwrap(),
            ["Full name", "Team", "Age", "QR Code Image"]
        );
        assert_eq!(store.config_store().load_workbook_path(), Some(path));

        // The old daily file keeps its own header.
        assert_eq!(workbook::header(&daily, "QR Codes").unwrap()[0], "Name");
    }

    #[test]
    fn test_matching_daily_workbook_is_reused() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());

        let daily = store.current_workbook_path_at(&labels(), morning()).unwrap();
        store
            .config_store()
            .save_workbook_path(&dir.path().join("gone.xlsx"))
            .unwrap();
        assert_eq!(store.current_workbook_path_at(&labels(), morning()).unwrap(), daily);
    }

    #[test]
    fn test_artifact_write_failure_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());

        // Image directory never created.
        let record = Record::from_values(&["Alice"], ',').unwrap();
        let image = QrEncoder::new().encode_string("Alice").unwrap();
        let err = store.persist_artifact(&record, image).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)), "{err:?}");
        assert_eq!(err.kind(), "persistence");
    }

    #[test]
    fn test_persist_artifact_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());
        store.ensure_directories_on(day()).unwrap();

        let image = QrEncoder::new().encode_string("Alice,42").unwrap();
        let comma = Record::from_values(&["Alice", "42"], ',').unwrap();
        let space = Record::from_values(&["Alice 42"], ',').unwrap();

        let first = store.persist_artifact(&comma, image.clone()).unwrap();
        let second = store.persist_artifact(&space, image).unwrap();

        assert!(first.path.ends_with("Alice_42.png"));
        assert!(second.path.ends_with("Alice_42_1.png"));
        assert!(first.path.is_file() && second.path.is_file());
    }

    #[test]
    fn test_append_record_adds_row_and_cleans_thumbnail() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());
        store.ensure_directories_on(day()).unwrap();
        let path = store.current_workbook_path_at(&labels(), morning()).unwrap();

        let record = Record::from_values(&["Alice", "", "42"], ',').unwrap();
        let image = QrEncoder::new().encode_string(record.payload()).unwrap();
        let artifact = store.persist_artifact(&record, image).unwrap();

        assert_eq!(store.append_record(&path, &record, &artifact).unwrap(), 2);
        assert_eq!(store.record_count(&path).unwrap(), 1);

        let thumbs = path.parent().unwrap().join(THUMBNAIL_DIR);
        assert_eq!(fs::read_dir(thumbs).unwrap().count(), 0);
    }
}

//! Record submission workflow
//!
//! A submission moves through `Idle → Validating → Encoding → Persisting → Idle`.
//! Blank input ends in `Rejected` before any file is touched; an encoder or
//! workbook failure ends in `Failed`. Every path returns to `Idle` and every
//! error is turned into a [`SubmitOutcome`] instead of being propagated.
//!
//! An artifact written before a failed workbook append stays on disk.

mod queue;

pub use queue::SubmissionQueue;

use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::qr::QrEncoder;
use crate::record::{FieldLabels, Record};
use crate::store::ArtifactStore;
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Edge length of the preview image when none is configured
pub const DEFAULT_DISPLAY_SIZE: u32 = 200;

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Waiting for a submission
    Idle,
    /// Trimming and checking values
    Validating,
    /// Blank submission refused
    Rejected,
    /// Rendering the QR image
    Encoding,
    /// Writing the artifact and the workbook row
    Persisting,
    /// Encoding or persistence failed
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Encoding => "encoding",
            Self::Persisting => "persisting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one submission, as reported to a front end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    /// Whether a row was appended
    pub ok: bool,
    /// User-facing message
    pub message: String,
    /// Artifact PNG, if one was written (also on workbook failure)
    pub image_path: Option<PathBuf>,
    /// Workbook the row was appended to
    pub workbook_path: Option<PathBuf>,
    /// Row number of the appended record
    pub row: Option<u32>,
    /// Error kind when `ok` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl SubmitOutcome {
    fn success(image: PathBuf, workbook: PathBuf, row: u32) -> Self {
        Self {
            ok: true,
            message: format!(
                "QR code saved as '{}' and added to '{}'",
                image.display(),
                workbook.display()
            ),
            image_path: Some(image),
            workbook_path: Some(workbook),
            row: Some(row),
            error: None,
        }
    }

    pub(crate) fn failure(err: &Error, image: Option<PathBuf>) -> Self {
        Self {
            ok: false,
            message: err.to_string(),
            image_path: image,
            workbook_path: None,
            row: None,
            error: Some(err.kind()),
        }
    }
}

/// Turns submitted field values into an artifact plus a workbook row
pub struct Workflow {
    encoder: QrEncoder,
    store: ArtifactStore,
    labels: FieldLabels,
    delimiter: char,
    display_size: u32,
    state: WorkflowState,
    trail: Vec<WorkflowState>,
}

impl Workflow {
    /// Build from configuration, restoring persisted labels when they match the
    /// configured field keys. Reads state documents only; nothing is written.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let store = ArtifactStore::from_config(config);
        let defaults = config.fields.default_labels()?;

        let labels = match store.config_store().load_labels() {
            Some(stored) if stored.same_keys(&defaults) => stored,
            Some(_) => {
                tracing::warn!("Stored labels do not match configured fields, using defaults");
                defaults
            }
            None => defaults,
        };

        Ok(Self::with_parts(
            config.encoder.encoder(),
            store,
            labels,
            config.fields.delimiter,
        )
        .with_display_size(config.encoder.display_size))
    }

    /// Assemble from explicit parts
    pub fn with_parts(
        encoder: QrEncoder,
        store: ArtifactStore,
        labels: FieldLabels,
        delimiter: char,
    ) -> Self {
        Self {
            encoder,
            store,
            labels,
            delimiter,
            display_size: DEFAULT_DISPLAY_SIZE,
            state: WorkflowState::Idle,
            trail: vec![WorkflowState::Idle],
        }
    }

    /// Set the edge length of [`Self::preview`] images
    pub fn with_display_size(mut self, size: u32) -> Self {
        self.display_size = size.max(1);
        self
    }

    /// Edge length of preview images
    pub fn display_size(&self) -> u32 {
        self.display_size
    }

    /// Current field labels
    pub fn labels(&self) -> &FieldLabels {
        &self.labels
    }

    /// Current state; `Idle` between submissions
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// States visited by the most recent submission, starting and ending in `Idle`
    pub fn last_transitions(&self) -> &[WorkflowState] {
        &self.trail
    }

    /// Artifact store used for persistence
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Workbook the next submission will be appended to
    pub fn workbook_path(&self) -> Result<PathBuf> {
        self.store.current_workbook_path(&self.labels)
    }

    /// Submit one snapshot of field values, in field order.
    pub fn submit<S: AsRef<str>>(&mut self, values: &[S]) -> SubmitOutcome {
        self.trail = vec![WorkflowState::Idle];
        self.transition(WorkflowState::Validating);

        let record = match self.validate(values) {
            Ok(record) => record,
            Err(err) => {
                tracing::info!(error = %err, "Submission rejected");
                self.transition(WorkflowState::Rejected);
                self.transition(WorkflowState::Idle);
                return SubmitOutcome::failure(&err, None);
            }
        };

        self.transition(WorkflowState::Encoding);
        let image = match self.encoder.encode_string(record.payload()) {
            Ok(image) => image,
            Err(err) => return self.fail(err, None),
        };

        self.transition(WorkflowState::Persisting);
        let artifact = match self
            .store
            .ensure_directories()
            .and_then(|_| self.store.persist_artifact(&record, image))
        {
            Ok(artifact) => artifact,
            Err(err) => return self.fail(err, None),
        };

        let appended = self
            .store
            .current_workbook_path(&self.labels)
            .and_then(|path| {
                self.store
                    .append_record(&path, &record, &artifact)
                    .map(|row| (path, row))
            });

        match appended {
            Ok((workbook, row)) => {
                self.transition(WorkflowState::Idle);
                SubmitOutcome::success(artifact.path, workbook, row)
            }
            Err(err) => self.fail(err, Some(artifact.path)),
        }
    }

    /// Replace field labels. A changed label list persists the new labels and
    /// rotates to a fresh workbook; the returned path is the current workbook.
    pub fn relabel(&mut self, labels: FieldLabels) -> Result<PathBuf> {
        if !self.labels.same_keys(&labels) {
            return Err(Error::Config(
                "new labels must use the same field keys".to_string(),
            ));
        }

        if labels == self.labels && self.store.config_store().load_labels().is_some() {
            return self.workbook_path();
        }

        self.store.config_store().save_labels(&labels)?;
        let changed = labels.labels() != self.labels.labels();
        self.labels = labels;

        if changed {
            self.store.ensure_directories()?;
            self.store.rotate_workbook(&self.labels)
        } else {
            self.workbook_path()
        }
    }

    /// Display-sized image for a payload, as a front end would show it
    pub fn preview(&self, payload: &str) -> Result<DynamicImage> {
        self.encoder.display_image(payload, self.display_size)
    }

    fn validate<S: AsRef<str>>(&self, values: &[S]) -> Result<Record> {
        if values.len() != self.labels.len() {
            return Err(Error::Validation(format!(
                "expected {} field values, got {}",
                self.labels.len(),
                values.len()
            )));
        }
        Record::from_values(values, self.delimiter)
    }

    fn fail(&mut self, err: Error, image: Option<PathBuf>) -> SubmitOutcome {
        tracing::warn!(error = %err, kind = err.kind(), artifact = ?image, "Submission failed");
        self.transition(WorkflowState::Failed);
        self.transition(WorkflowState::Idle);
        SubmitOutcome::failure(&err, image)
    }

    fn transition(&mut self, next: WorkflowState) {
        tracing::trace!(from = %self.state, to = %next, "Workflow transition");
        self.state = next;
        self.trail.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workflow(root: &std::path::Path) -> Workflow {
        let mut config = LedgerConfig::rooted_at(root);
        config.fields.keys = vec!["A".into(), "B".into(), "C".into()];
        Workflow::new(&config).unwrap()
    }

    #[test]
    fn test_success_path_transitions() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(dir.path());

        let outcome = wf.submit(&["Alice", "", "42"]);
        assert!(outcome.ok, "{}", outcome.message);
        assert_eq!(outcome.row, Some(2));
        assert_eq!(
            wf.last_transitions(),
            &[
                WorkflowState::Idle,
                WorkflowState::Validating,
                WorkflowState::Encoding,
                WorkflowState::Persisting,
                WorkflowState::Idle,
            ]
        );
        assert_eq!(wf.state(), WorkflowState::Idle);
    }

    #[test]
    fn test_blank_submission_is_rejected_without_io() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(dir.path());

        let outcome = wf.submit(&[" ", "", "\t"]);
        assert!(!outcome.ok);
        assert_eq!(outcome.error, Some("validation"));
        assert_eq!(
            wf.last_transitions(),
            &[
                WorkflowState::Idle,
                WorkflowState::Validating,
                WorkflowState::Rejected,
                WorkflowState::Idle,
            ]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_wrong_value_count_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(dir.path());
        let outcome = wf.submit(&["only one"]);
        assert_eq!(outcome.error, Some("validation"));
    }

    #[test]
    fn test_workbook_failure_keeps_artifact() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(dir.path());

        let broken = dir.path().join("broken.xlsx");
        std::fs::write(&broken, b"not a workbook").unwrap();
        wf.store().config_store().save_workbook_path(&broken).unwrap();

        let outcome = wf.submit(&["Alice", "", "42"]);
        assert!(!outcome.ok);
        assert_eq!(outcome.error, Some("persistence"));
        let image = outcome.image_path.expect("artifact path reported");
        assert!(image.is_file());
        assert_eq!(wf.last_transitions().last(), Some(&WorkflowState::Idle));
        assert!(wf.last_transitions().contains(&WorkflowState::Failed));
    }

    #[test]
    fn test_relabel_with_other_keys_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut wf = workflow(dir.path());
        let other = FieldLabels::new([("X", "Other")]).unwrap();
        assert!(matches!(wf.relabel(other), Err(Error::Config(_))));
    }

    #[test]
    fn test_preview_uses_configured_display_size() {
        let dir = TempDir::new().unwrap();
        let wf = workflow(dir.path());
        let image = wf.preview("Alice,42").unwrap();
        assert_eq!((image.width(), image.height()), (200, 200));

        let mut config = LedgerConfig::rooted_at(dir.path());
        config.encoder.display_size = 320;
        let wf = Workflow::new(&config).unwrap();
        assert_eq!(wf.display_size(), 320);
        assert_eq!(wf.preview("Bob").unwrap().width(), 320);
        assert!(matches!(wf.preview(""), Err(Error::QrEncode(_))));
    }
}

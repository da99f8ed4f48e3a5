//! qrledger - QR codes from short form values, collected in an xlsx ledger
//!
//! A submission takes one value per form field, joins the non-empty ones into
//! a payload, renders it as a QR code, saves the PNG and appends a workbook
//! row holding the values plus an embedded copy of the image.
//!
//! # Features
//!
//! - **QR Processing**: High-ECC encoding with fixed geometry, decoding for verification
//! - **Workbook Ledger**: Header row from field labels, one row per record, rotation on relabel
//! - **Persistent State**: Current workbook path and labels survive restarts
//! - **Single Writer**: Submissions are applied one at a time, in order
//!
//! # Example
//!
//! ```no_run
//! use qrledger::{LedgerConfig, SubmissionQueue, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LedgerConfig::load(None)?;
//!     let (queue, _worker) = SubmissionQueue::spawn(Workflow::new(&config)?);
//!
//!     let values = ["Alice", "", "42", "", ""].map(String::from).to_vec();
//!     let outcome = queue.submit(values).await;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod config_store;
pub mod error;
pub mod logging;
pub mod qr;
pub mod record;
pub mod store;
pub mod workflow;

// Re-exports for convenience
pub use error::{Error, Result};

pub use config::{LedgerConfig, LogRotation, LoggingOptions};
pub use config_store::ConfigStore;
pub use qr::{ErrorCorrection, QrDecoder, QrEncoder, QrPayload};
pub use record::{FieldLabels, FieldSet, FieldSpec, Record};
pub use store::{ArtifactStore, QrArtifact};
pub use workflow::{SubmissionQueue, SubmitOutcome, Workflow, WorkflowState};

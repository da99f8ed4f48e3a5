//! Submit one record into a scratch ledger and print where it went
//!
//! Usage: cargo run --example generate_record -- [DIR]

use qrledger::{LedgerConfig, Workflow};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("qrledger_demo"));

    let mut workflow = Workflow::new(&LedgerConfig::rooted_at(&root))?;

    let outcome = workflow.submit(&["Alice", "", "42", "", ""]);
    println!("{}", outcome.message);

    if let Some(image) = outcome.image_path {
        println!("  Artifact: {}", image.display());
    }
    if let (Some(workbook), Some(row)) = (outcome.workbook_path, outcome.row) {
        println!("  Workbook: {} (row {row})", workbook.display());
    }

    Ok(())
}

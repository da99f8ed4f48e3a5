//! Dated workbook locations and collision-free file names

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

const WORKBOOK_PREFIX: &str = "qr_codes";

/// `<excel_dir>/<YYYYMMDD>`
pub fn dated_dir(excel_dir: &Path, date: NaiveDate) -> PathBuf {
    excel_dir.join(date.format("%Y%m%d").to_string())
}

/// `<excel_dir>/<YYYYMMDD>/qr_codes_<YYYYMMDD>.xlsx`, the first workbook of a day
pub fn daily_workbook_path(excel_dir: &Path, date: NaiveDate) -> PathBuf {
    let day = date.format("%Y%m%d");
    dated_dir(excel_dir, date).join(format!("{WORKBOOK_PREFIX}_{day}.xlsx"))
}

/// `<excel_dir>/<YYYYMMDD>/qr_codes_<YYYYMMDD>_<HHMMSS>[_n].xlsx`, never an existing file
pub fn rotated_workbook_path(excel_dir: &Path, now: NaiveDateTime) -> PathBuf {
    let stem = format!("{WORKBOOK_PREFIX}_{}", now.format("%Y%m%d_%H%M%S"));
    unique_path(&dated_dir(excel_dir, now.date()), &stem, "xlsx")
}

/// `<dir>/<stem>.<ext>`, or `<dir>/<stem>_<n>.<ext>` with the smallest free `n`
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return first;
    }

    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

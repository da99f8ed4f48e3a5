//! xlsx operations on the single-sheet ledger workbook

use crate::config::WorkbookOptions;
use crate::error::{Error, Result};
use std::path::Path;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::{HorizontalAlignmentValues, Image, Spreadsheet, Worksheet};

/// Row holding the field labels
pub const HEADER_ROW: u32 = 1;

/// Create the workbook with its header row. Returns `false` if a file already
/// exists at `path`; an existing workbook is never touched.
pub fn create(path: &Path, labels: &[String], layout: &WorkbookOptions) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet(layout.sheet_title.as_str())
        .map_err(|e| Error::Persistence(format!("Failed to add worksheet: {e}")))?;

    let headers = labels
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(layout.image_header.as_str()));
    let image_col = labels.len() as u32 + 1;

    for (idx, header) in headers.enumerate() {
        let col = idx as u32 + 1;
        sheet
            .get_cell_mut((col, HEADER_ROW))
            .set_value_string(header);
        sheet
            .get_style_mut((col, HEADER_ROW))
            .get_alignment_mut()
            .set_horizontal(HorizontalAlignmentValues::Center);

        let width = if col == image_col {
            layout.image_column_width
        } else {
            layout.text_column_width
        };
        sheet
            .get_column_dimension_mut(&column_letter(col))
            .set_width(width);
    }

    save(&book, path)?;
    tracing::info!(path = %path.display(), columns = image_col, "Created workbook");
    Ok(true)
}

/// Append one row of text values with an image anchored in the trailing
/// image column. The workbook is re-read from disk on every call, so a failed
/// save leaves nothing behind in memory.
///
/// Returns the 1-based row number written.
pub fn append_row(
    path: &Path,
    values: &[String],
    thumbnail: &Path,
    layout: &WorkbookOptions,
) -> Result<u32> {
    let mut book = open(path)?;
    let sheet = sheet_mut(&mut book, &layout.sheet_title)?;

    let row = sheet.get_highest_row().max(HEADER_ROW) + 1;
    for (idx, value) in values.iter().enumerate() {
        sheet
            .get_cell_mut((idx as u32 + 1, row))
            .set_value_string(value.as_str());
    }
    sheet.get_row_dimension_mut(&row).set_height(layout.row_height);

    let anchor = format!("{}{}", column_letter(values.len() as u32 + 1), row);
    let mut marker = MarkerType::default();
    marker.set_coordinate(anchor.as_str());

    let thumbnail_str = thumbnail.to_str().ok_or_else(|| {
        Error::Persistence(format!(
            "Image path is not valid UTF-8: {}",
            thumbnail.display()
        ))
    })?;
    let mut image = Image::default();
    image.new_image(thumbnail_str, marker);
    sheet.add_image(image);

    save(&book, path)?;
    tracing::debug!(path = %path.display(), row, anchor = %anchor, "Appended workbook row");
    Ok(row)
}

/// Text content of every row, header included, up to the header width.
pub fn read_rows(path: &Path, sheet_title: &str) -> Result<Vec<Vec<String>>> {
    let book = open(path)?;
    let sheet = sheet(&book, sheet_title)?;

    let width = sheet.get_highest_column();
    let height = sheet.get_highest_row();
    let rows = (1..=height)
        .map(|row| {
            (1..=width)
                .map(|col| {
                    sheet
                        .get_cell((col, row))
                        .map(|cell| cell.get_value().to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    Ok(rows)
}

/// Header row text, trailing image column included
pub fn header(path: &Path, sheet_title: &str) -> Result<Vec<String>> {
    let book = open(path)?;
    let sheet = sheet(&book, sheet_title)?;
    let header = (1..=sheet.get_highest_column())
        .map(|col| {
            sheet
                .get_cell((col, HEADER_ROW))
                .map(|cell| cell.get_value().to_string())
                .unwrap_or_default()
        })
        .collect();
    Ok(header)
}

/// Number of images embedded in the ledger sheet
pub fn image_count(path: &Path, sheet_title: &str) -> Result<usize> {
    let book = open(path)?;
    Ok(sheet(&book, sheet_title)?.get_image_collection().len())
}

/// Spreadsheet column name for a 1-based index (1 → A, 27 → AA)
pub fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn open(path: &Path) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| Error::Persistence(format!("Failed to open {}: {e}", path.display())))
}

fn save(book: &Spreadsheet, path: &Path) -> Result<()> {
    umya_spreadsheet::writer::xlsx::write(book, path)
        .map_err(|e| Error::Persistence(format!("Failed to save {}: {e}", path.display())))
}

fn sheet<'a>(book: &'a Spreadsheet, title: &str) -> Result<&'a Worksheet> {
    book.get_sheet_by_name(title)
        .ok_or_else(|| Error::Persistence(format!("Worksheet '{title}' not found")))
}

fn sheet_mut<'a>(book: &'a mut Spreadsheet, title: &str) -> Result<&'a mut Worksheet> {
    book.get_sheet_by_name_mut(title)
        .ok_or_else(|| Error::Persistence(format!("Worksheet '{title}' not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::QrEncoder;
    use tempfile::TempDir;

    fn labels() -> Vec<String> {
        vec!["Name".to_string(), "Team".to_string(), "Age".to_string()]
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(4), "D");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(53), "BA");
    }

    #[test]
    fn test_create_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("day/ledger.xlsx");
        let layout = WorkbookOptions::default();

        assert!(create(&path, &labels(), &layout).unwrap());
        assert!(!create(&path, &["Other".to_string()], &layout).unwrap());

        let rows = read_rows(&path, &layout.sheet_title).unwrap();
        assert_eq!(rows, vec![vec!["Name", "Team", "Age", "QR Code Image"]]);
    }

    #[test]
    fn test_append_row_keeps_empty_values_aligned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.xlsx");
        let layout = WorkbookOptions::default();
        create(&path, &labels(), &layout).unwrap();

        let image = QrEncoder::new().encode_string("Alice,42").unwrap();
        let thumb = dir.path().join("Alice_42.png");
        QrEncoder::resized(&image, 100, 100).save(&thumb).unwrap();

        let values = vec!["Alice".to_string(), String::new(), "42".to_string()];
        assert_eq!(append_row(&path, &values, &thumb, &layout).unwrap(), 2);

        let rows = read_rows(&path, &layout.sheet_title).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][..3], ["Alice", "", "42"]);
        assert_eq!(image_count(&path, &layout.sheet_title).unwrap(), 1);
    }

    #[test]
    fn test_append_to_garbage_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = append_row(
            &path,
            &["x".to_string()],
            &dir.path().join("missing.png"),
            &WorkbookOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }
}

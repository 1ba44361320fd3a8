/// Spreadsheet access seam
///
/// The concrete spreadsheet client (Google Sheets or otherwise) is an
/// external collaborator; the engine only needs row reads for the sheet
/// trigger and single-cell writes for row updates and error markers.

use crate::error::NodeError;
use async_trait::async_trait;

/// Capability contract for the external spreadsheet collaborator
#[async_trait]
pub trait SheetService: Send + Sync {
    /// Read all data rows (excluding the header row) as string cells
    async fn read_rows(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, NodeError>;

    /// Write one cell, addressed as `Sheet1!<ColLetter><Row>`
    async fn update_cell(
        &self,
        spreadsheet_id: &str,
        cell: &str,
        value: &str,
    ) -> Result<(), NodeError>;
}

/// Placeholder used when no spreadsheet integration is wired in
///
/// Sheet-driven runs fail loudly instead of silently processing nothing.
pub struct NullSheets;

#[async_trait]
impl SheetService for NullSheets {
    async fn read_rows(&self, _spreadsheet_id: &str) -> Result<Vec<Vec<String>>, NodeError> {
        Err(NodeError::Sheet("no sheet service configured".into()))
    }

    async fn update_cell(
        &self,
        _spreadsheet_id: &str,
        _cell: &str,
        _value: &str,
    ) -> Result<(), NodeError> {
        Err(NodeError::Sheet("no sheet service configured".into()))
    }
}

/// Convert a zero-based column index to its sheet letter (A-Z only)
pub fn column_letter(index: u32) -> Option<char> {
    if index < 26 {
        Some((b'A' + index as u8) as char)
    } else {
        None
    }
}

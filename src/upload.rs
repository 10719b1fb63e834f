//! The spreadsheet file an operator uploads for matching.

use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

/// File extensions the matcher service accepts.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// A bank-statement export ready to send to the matcher, along with the event it belongs to.
#[derive(Clone, Eq, PartialEq)]
pub struct Upload {
    file_name: String,
    event_id: String,
    bytes: Arc<[u8]>,
}

impl Upload {
    /// Creates an `Upload` from in-memory contents. The extension of `file_name` is validated.
    pub fn new(
        file_name: impl Into<String>,
        event_id: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Res<Self> {
        let file_name = file_name.into();
        validate_extension(&file_name)?;
        let event_id = event_id.into();
        if event_id.trim().is_empty() {
            bail!("An event id is required to check a deposit file");
        }
        Ok(Self {
            file_name,
            event_id,
            bytes: bytes.into(),
        })
    }

    /// Validates the extension of `path` and then reads it. Nothing is read when the extension is
    /// wrong.
    pub async fn open(path: &Path, event_id: impl Into<String>) -> Res<Self> {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .with_context(|| format!("'{}' does not name a file", path.display()))?;
        validate_extension(&file_name)?;
        let bytes = utils::read_bytes(path).await?;
        Self::new(file_name, event_id, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Debug for Upload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("event_id", &self.event_id)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Fails unless `file_name` ends in a recognized spreadsheet extension (case-insensitive).
pub fn validate_extension(file_name: &str) -> Res<()> {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match extension {
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => bail!(
            "'{file_name}' is not a spreadsheet; upload a .xlsx or .xls file exported from \
            your bank"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("deposits.xlsx").is_ok());
        assert!(validate_extension("DEPOSITS.XLS").is_ok());
        assert!(validate_extension("march.statement.Xlsx").is_ok());
        assert!(validate_extension("deposits.csv").is_err());
        assert!(validate_extension("deposits").is_err());
        assert!(validate_extension("xlsx").is_err());
        let err = validate_extension("deposits.pdf").unwrap_err();
        assert!(err.to_string().contains("not a spreadsheet"), "{err}");
    }

    #[test]
    fn test_new_requires_event_id() {
        assert!(Upload::new("a.xlsx", "  ", vec![1u8, 2, 3]).is_err());
        let upload = Upload::new("a.xlsx", "EV-1", vec![1u8, 2, 3]).unwrap();
        assert_eq!(upload.bytes(), &[1, 2, 3]);
        assert!(format!("{upload:?}").contains("bytes: 3"));
    }

    #[tokio::test]
    async fn test_open_rejects_before_reading() {
        // The file does not exist, so a read would fail with a different message.
        let err = Upload::open(Path::new("/nonexistent/deposits.txt"), "EV-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a spreadsheet"), "{err}");
    }

    #[tokio::test]
    async fn test_open_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("march.xlsx");
        utils::write(&path, b"PK\x03\x04").await.unwrap();
        let upload = Upload::open(&path, "EV-1").await.unwrap();
        assert_eq!(upload.file_name(), "march.xlsx");
        assert_eq!(upload.event_id(), "EV-1");
        assert_eq!(upload.bytes(), b"PK\x03\x04");
    }
}

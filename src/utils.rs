use crate::error::Res;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Res<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Res<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Read a file to bytes.
pub(crate) async fn read_bytes(path: &Path) -> Res<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Res<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Create a directory and all of its parents.
pub(crate) async fn make_dir(p: &Path) -> Res<()> {
    tokio::fs::create_dir_all(p)
        .await
        .with_context(|| format!("Unable to create directory at {}", p.to_string_lossy()))
}

/// Canonicalize `p`, failing if it does not exist.
pub(crate) async fn canonicalize(p: &Path) -> Res<PathBuf> {
    tokio::fs::canonicalize(p)
        .await
        .with_context(|| format!("Unable to canonicalize the path {}", p.to_string_lossy()))
}

/// Deserializes a JSON `null` (or a missing field, when combined with `#[serde(default)]`) as
/// `T::default()`. The backend sends `null` for display strings it does not have.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Formats a whole-unit amount with thousands separators, e.g. `50000` -> `50,000`.
pub(crate) fn format_amount(amount: i64) -> String {
    format_num::format_num!(",.0", amount as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(50000), "50,000");
        assert_eq!(format_amount(0), "0");
    }

    #[tokio::test]
    async fn test_write_then_deserialize() {
        #[derive(Deserialize)]
        struct Thing {
            name: String,
        }
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("thing.json");
        write(&path, r#"{"name":"Kim"}"#).await.unwrap();
        let thing: Thing = deserialize(&path).await.unwrap();
        assert_eq!(thing.name, "Kim");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}

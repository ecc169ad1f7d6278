//! JSON file catalog source
//!
//! Reads a catalog export of the form
//! `{"tables":[{"schema":"dbo","table":"S","columns":["a","b"]}]}`.

use crate::catalog::CatalogSnapshot;
use crate::source::{CatalogSource, FetchError};
use std::path::{Path, PathBuf};

/// Catalog source backed by a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl CatalogSource for JsonFileSource {
    fn name(&self) -> &'static str {
        "JsonFile"
    }

    async fn load_snapshot(&self) -> Result<CatalogSnapshot, FetchError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::IoError(format!("{}: {}", self.path.display(), e)))?;

        let snapshot = CatalogSnapshot::from_json(&contents)?;
        tracing::debug!(path = %self.path.display(), tables = snapshot.len(), "read catalog file");
        Ok(snapshot)
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| FetchError::IoError(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaCatalog;

    #[tokio::test]
    async fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"tables":[{"schema":"dbo","table":"T","columns":["a","b","c"]}]}"#,
        )
        .unwrap();

        let source = JsonFileSource::new(&path);
        assert!(source.test_connection().await.is_ok());

        let snapshot = source.load_snapshot().await.unwrap();
        assert_eq!(snapshot.columns_of("dbo", "t"), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = JsonFileSource::new("/nonexistent/catalog.json");
        assert!(matches!(source.test_connection().await, Err(FetchError::IoError(_))));
        assert!(matches!(source.load_snapshot().await, Err(FetchError::IoError(_))));
    }
}

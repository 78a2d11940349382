//! CSV article source.
//!
//! Expected columns: `title`, `author`, `link`, `text`. Only `text` is
//! required; other columns are carried into the row hash but not the document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::document::RawDocument;
use crate::error::{RagError, Result};
use crate::identity;

/// Loads [`RawDocument`]s from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    /// Create a loader for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if the file does not exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(RagError::LoaderError {
                path: path.display().to_string(),
                message: "CSV not found".into(),
            });
        }
        Ok(Self { path })
    }

    /// The source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::LoaderError { path: self.path.display().to_string(), message: message.into() }
    }

    /// Read every row.
    ///
    /// The row id is the zero-based data row index. Blank cells become `None`;
    /// a blank `text` cell becomes an empty body, which chunks to nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoaderError`] if the file cannot be parsed or has
    /// no `text` column. Nothing is returned on error.
    pub fn load(&self) -> Result<Vec<RawDocument>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.error(e.to_string()))?;
        let headers = reader.headers().map_err(|e| self.error(e.to_string()))?.clone();
        if !headers.iter().any(|h| h == "text") {
            return Err(self.error("missing required column 'text'"));
        }

        let mut documents = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| self.error(format!("row {index}: {e}")))?;
            let fields: BTreeMap<String, Option<String>> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), (!v.trim().is_empty()).then(|| v.to_string())))
                .collect();

            let cell = |name: &str| fields.get(name).cloned().flatten();
            let text = cell("text").unwrap_or_default();
            if text.is_empty() {
                warn!(row_id = index, "row has empty text");
            }

            documents.push(RawDocument {
                row_id: index as u64,
                title: cell("title"),
                author: cell("author"),
                source: cell("link"),
                text,
                hash: identity::row_hash(&fields),
            });
        }

        info!(path = %self.path.display(), count = documents.len(), "loaded documents");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_fails_fast() {
        let err = CsvLoader::new("/nonexistent/articles.csv").unwrap_err();
        assert!(matches!(err, RagError::LoaderError { .. }));
    }

    #[test]
    fn blank_optional_cells_are_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title,author,link,text").unwrap();
        writeln!(file, "Metaphors,,https://example.com/a,Argument is war.").unwrap();
        writeln!(file, ",Lakoff,,Time is money.").unwrap();

        let docs = CsvLoader::new(file.path()).unwrap().load().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].row_id, 0);
        assert_eq!(docs[0].author, None);
        assert_eq!(docs[0].source.as_deref(), Some("https://example.com/a"));
        assert_eq!(docs[1].title, None);
        assert_eq!(docs[1].text, "Time is money.");
        assert_ne!(docs[0].hash, docs[1].hash);
    }

    #[test]
    fn text_column_is_required() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title,body").unwrap();
        writeln!(file, "a,b").unwrap();
        assert!(CsvLoader::new(file.path()).unwrap().load().is_err());
    }
}

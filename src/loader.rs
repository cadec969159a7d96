//! Document loading boundary.
//!
//! Loaders turn a file into ordered [`PageDocument`]s. The built-in
//! [`TextLoader`] handles plain-text formats; richer container formats
//! plug in through the same trait.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::types::PageDocument;

/// Trait for file format loaders.
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader can handle the given path.
    fn supports(&self, path: &Path) -> bool;

    /// Loads the file into pages, numbered from one, in document order.
    fn load(&self, path: &Path) -> Result<Vec<PageDocument>>;
}

/// Plain-text loader for `.txt`, `.text` and `.md` files.
///
/// Form feeds act as page breaks; a file without them is a single page.
/// The file name becomes the `source_id` of every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "txt" | "text" | "md"))
    }

    fn load(&self, path: &Path) -> Result<Vec<PageDocument>> {
        if !self.supports(path) {
            return Err(PipelineError::UnsupportedFormat(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                PipelineError::Input(format!("no such document: {}", path.display()))
            } else {
                PipelineError::Io(e)
            }
        })?;
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(raw
            .split('\u{0c}')
            .enumerate()
            .map(|(i, page)| PageDocument::new(page.to_string(), source_id.clone(), i as u32 + 1))
            .collect())
    }
}

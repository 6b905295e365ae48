// load.rs — Reading graphs from disk
//
// Picks the decoder from the file extension (or an explicit format) and wraps
// every way a load can fail in one `LoadError`.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::graph::{Graph, GraphDecodeError};
use crate::sketch::SketchErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Sketch,
}

impl SourceFormat {
    /// `.json` is JSON; anything else is read as a sketch.
    pub fn from_path(path: &Path) -> SourceFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Sketch,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: String,
        #[source]
        source: GraphDecodeError,
    },
    #[error("{path}: {errors}")]
    Sketch {
        path: String,
        text: String,
        errors: SketchErrors,
    },
}

impl LoadError {
    /// One `path:line:col: …` line per sketch diagnostic; empty for other
    /// kinds of failure.
    pub fn details(&self) -> Vec<String> {
        match self {
            LoadError::Sketch { path, text, errors } => {
                errors.0.iter().map(|d| d.render(text, path)).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Decode `text` in the given format. `path` is used only in error messages.
pub fn load_str(text: &str, format: SourceFormat, path: &str) -> Result<Graph, LoadError> {
    match format {
        SourceFormat::Json => Graph::from_json(text).map_err(|source| LoadError::Json {
            path: path.to_string(),
            source,
        }),
        SourceFormat::Sketch => crate::sketch::load(text).map_err(|errors| LoadError::Sketch {
            path: path.to_string(),
            text: text.to_string(),
            errors,
        }),
    }
}

/// Read and decode a graph file. Without an explicit format the extension
/// decides.
pub fn load_path(path: &Path, format: Option<SourceFormat>) -> Result<Graph, LoadError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let format = format.unwrap_or_else(|| SourceFormat::from_path(path));
    load_str(&text, format, &display)
}

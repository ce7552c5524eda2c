use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("world file is not a .json: {}", .0.display())]
    NotJson(PathBuf),

    #[error("world '{0}' must be a JSON object")]
    NotObject(String),

    #[error("world key {key} must be {expected}, found {found}")]
    CategoryShape {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid world JSON in '{name}': {message}")]
    Json { name: String, message: String },

    #[error("failed reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

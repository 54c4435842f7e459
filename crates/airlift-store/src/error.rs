use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O error ({kind}) on {path}: {message}")]
    Io {
        kind: std::io::ErrorKind,
        path: String,
        message: String,
    },

    #[error("failed to encode store file {path}: {message}")]
    Encode { path: String, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: &std::io::Error) -> Self {
        Self::Io {
            kind: source.kind(),
            path: path.into(),
            message: source.to_string(),
        }
    }

    pub fn encode(path: impl Into<String>, source: &serde_json::Error) -> Self {
        Self::Encode {
            path: path.into(),
            message: source.to_string(),
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Invalid grid option {0:?}")]
    InvalidGridOption(String),
    #[error("Rejected with status {status:?}: {description}")]
    Rejected { status: String, description: String },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, ProtocolError>;

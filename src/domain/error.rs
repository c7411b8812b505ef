// Domain errors for dashboard construction and import
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("unknown color '{0}'")]
    UnknownColor(String),

    #[error("invalid threshold boundary '{0}', expected an integer")]
    InvalidThreshold(String),

    #[error("{colors} color(s) supplied but {required} are needed for the given thresholds")]
    InsufficientColors { colors: usize, required: usize },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("panel link '{0}' is not an absolute URL")]
    InvalidLink(String),

    #[error("unsupported panel type '{0}'")]
    UnsupportedPanelType(String),

    #[error("malformed dashboard document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

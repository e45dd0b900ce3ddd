use thiserror::Error;

use crate::variant::Variant;

/// Errors raised by the background renderer and its collaborators.
#[derive(Debug, Error)]
pub enum BackdropError {
    /// The drawing target rejected an operation. Terminal for the instance.
    #[error("render surface failure: {0}")]
    Surface(String),

    /// The host refused to schedule or cancel a frame.
    #[error("frame scheduling failed: {0}")]
    Scheduler(String),

    #[error("invalid background configuration: {0}")]
    Config(String),

    #[error("invalid background XML")]
    Xml(#[from] roxmltree::Error),

    #[error("variant `{}` does not react to appearance changes", .0.id())]
    AppearanceUnsupported(Variant),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BackdropError> = std::result::Result<T, E>;

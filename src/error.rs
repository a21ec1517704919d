use crate::state::TransitionError;
use thiserror::Error;

// Application-level errors using thiserror for structured error handling.
//
// These errors represent domain-specific failures that can occur during
// operation. The binary chains them with anyhow for context.

/// The game window or its start control could not be found at startup.
///
/// Always fatal: the controller never retries locating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("Game window not found on screen (similarity threshold {threshold})")]
    AnchorNotFound { threshold: f64 },

    #[error("Start control not found inside the game window (similarity threshold {threshold})")]
    StartControlNotFound { threshold: f64 },

    #[error("No screen frame available while locating the game window")]
    CaptureUnavailable,

    #[error("Play-area margins leave nothing of the game window")]
    DegeneratePlayArea,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to initialize screen capturer")]
    InitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No displays found")]
    NoDisplays,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to simulate {action}")]
    SimulateFailed { action: String },

    #[error("Physical input listener is not running")]
    ListenerUnavailable,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load {name} template from {path}")]
    LoadFailed {
        name: &'static str,
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Anything that ends a controller run early
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Game loop entered an impossible state: {0}")]
    State(#[from] TransitionError),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

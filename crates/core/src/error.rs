use std::path::PathBuf;

use crate::{runtime::PluginState, AudioFeature, ControlHandle};

/// Result alias that carries the custom [`BobError`] type.
pub type Result<T> = std::result::Result<T, BobError>;

/// Common error type shared by the host runtime and plugins.
#[derive(Debug, thiserror::Error)]
pub enum BobError {
    /// Free-form failure, mostly poisoned locks and host glue.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid analysis input: {0}")]
    InvalidInput(&'static str),
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),

    /// The dynamic library could not be opened.
    #[error("failed to load plugin library: {0}")]
    LibraryLoad(#[from] libloading::Error),
    #[error("plugin {path:?} does not export `{symbol}`")]
    MissingEntryPoint { path: PathBuf, symbol: &'static str },
    #[error("plugin {path:?} was built against ABI {found}, host expects {expected}")]
    AbiMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("no visualisation module named `{0}`")]
    UnknownModule(String),

    #[error("control registration rejected: {0}")]
    Registration(#[from] RegistrationError),
    /// Controls may only be registered while the instance is being created.
    #[error("controls can only be registered during create")]
    RegistrationClosed,

    #[error("{feature:?} was not declared by the plugin")]
    FeatureNotDeclared { feature: AudioFeature },
    #[error("control {handle} is a {actual}, not a {requested}")]
    ControlTypeMismatch {
        handle: ControlHandle,
        requested: &'static str,
        actual: &'static str,
    },
    #[error("control {0} was never registered")]
    UnknownHandle(ControlHandle),
    #[error("control {0} belongs to a destroyed instance")]
    StaleHandle(ControlHandle),
    #[error("control {0} belongs to another instance")]
    ForeignHandle(ControlHandle),
    #[error("cannot {operation} a plugin in state {state:?}")]
    Lifecycle {
        state: PluginState,
        operation: &'static str,
    },
}

/// Reasons the control registry turns down a registration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error("registry is full ({capacity} controls)")]
    Exhausted { capacity: usize },
    #[error("control name must not be empty")]
    EmptyName,
    #[error("control `{0}` is already registered by this instance")]
    DuplicateName(String),
    #[error("invalid range for `{name}`: [{min}, {max}] with default {default}")]
    InvalidRange {
        name: String,
        min: f32,
        max: f32,
        default: f32,
    },
}

impl BobError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BobError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BobError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

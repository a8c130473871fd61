use thiserror::Error;

/// Hard configuration failures; the process refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("required configuration key {key} is not set")]
    MissingRequired { key: &'static str },

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

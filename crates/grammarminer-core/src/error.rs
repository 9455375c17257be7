//! Crate-wide error types.

/// Errors surfaced by configuration loading.
///
/// These always propagate to the caller; there is no silent fallback for a
/// malformed or unreadable configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration as TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Errors raised while decoding or encoding a pseudo-name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PseudoNameError {
    #[error("pseudo-name `{0}` is missing the opening `<`")]
    MissingOpenDelimiter(String),

    #[error("pseudo-name `{0}` is missing the closing `>`")]
    MissingCloseDelimiter(String),

    #[error("pseudo-name `{0}` has an unrecognized control kind `{1}` (expected `if` or `while`)")]
    UnknownControlKind(String, String),

    #[error("pseudo-name `{0}` has a malformed field list")]
    MalformedFields(String),

    #[error("pseudo-name `{0}` has a non-integer id in field `{1}`")]
    InvalidId(String, &'static str),
}

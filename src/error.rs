use thiserror::Error;

pub type Result<T> = std::result::Result<T, TfGateError>;

/// Hard failures of a scan invocation. Everything else is recovered locally
/// and reported as a [`crate::report::Diagnostic`].
#[derive(Error, Debug)]
pub enum TfGateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TfGateError {
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Whether this error means the configuration was unusable.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Toml(_) | Self::Yaml(_) | Self::DuplicateRuleId(_)
        )
    }
}

/// A configuration document that could not be turned into resources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unexpected document shape at `{path}`: {message}")]
    Shape { path: String, message: String },

    #[error("could not read file: {0}")]
    Read(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Syntax {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

/// A rule's check function could not evaluate a resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("attribute `{attribute}` has unexpected shape: expected {expected}")]
    UnexpectedShape {
        attribute: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Other(String),
}

/// An enrichment provider could not produce its section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("tool `{0}` is not installed or not on PATH")]
    ToolMissing(String),

    #[error("tool `{tool}` exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("provider is not configured: {0}")]
    NotConfigured(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("could not decode provider output: {0}")]
    Decode(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("provider panicked: {0}")]
    Panicked(String),
}

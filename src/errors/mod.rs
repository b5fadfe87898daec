//! # Error Handling
//!
//! Error types for the generation core, defined with `thiserror`. A single
//! enum covers the whole crate: structural/config errors abort one proxy's
//! generation pass, while parse errors are typed so callers can reject bad
//! input without guessing intent.

/// Custom result type for meshplane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the generation core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Structural/configuration errors. Fatal to the proxy's generation
    /// call; `field` carries the offending field path when known so a bad
    /// cluster or listener can be traced back to the originating policy.
    #[error("Configuration error: {message}")]
    Config { message: String, field: Option<String> },

    /// Malformed SNI string (unbalanced or duplicated braces)
    #[error("Invalid SNI '{input}': {reason}")]
    SniParse { input: String, reason: String },

    /// Malformed geocoordinate input
    #[error("Invalid {axis} '{value}': not a decimal degree value")]
    GeoParse { axis: &'static str, value: String },

    /// The datacenter catalog does not contain the proxy's own datacenter
    #[error("Datacenter '{id}' not found in catalog")]
    DatacenterNotFound { id: String },

    /// Listener protocol with no registered generator
    #[error("Unsupported listener protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    /// Two generators produced a resource with the same name and type
    #[error("Resource conflict: {resource_type} '{name}' emitted twice")]
    Conflict { name: String, resource_type: String },

    /// Internal errors (protobuf encoding and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error carrying the offending field path
    pub fn config_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a new SNI parse error
    pub fn sni_parse<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::SniParse { input: input.into(), reason: reason.into() }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Field path of the originating policy, when the error carries one
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Config { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}

//! Unified error types for the HiveGate core.
//!
//! A single `Error` enum that every subsystem converts into, so callers of
//! the pipeline handle failures uniformly.  All variants are `Copy` so they
//! can be passed through the service and tick report without allocation.
//!
//! Missing telemetry is **not** an error: it is reported through
//! `NormalizedTelemetry::missing_fields` and never reaches this type.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed input shape.  Aborts the whole call.
    Validation(ValidationError),
    /// Configuration is invalid.
    Config(&'static str),
    /// Canonical encoding of a ledger payload failed.
    Encoding(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Encoding(msg) => write!(f, "encoding: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Raw telemetry (or a query, or a policy document) was not a JSON object.
    NotARecord(&'static str),
    /// Actuation request at `index` has an empty subject id.
    EmptySubjectId { index: usize },
    /// Actuation request at `index` names an actuator outside the enumerated set.
    UnknownActuator { index: usize },
    /// Actuation request at `index` has a NaN or infinite magnitude.
    NonFiniteMagnitude { index: usize },
    /// Actuation request at `index` has a zero or negative duration.
    NonPositiveDuration { index: usize },
    /// Actuation request at `index` is missing a field or has the wrong type.
    MalformedRequest { index: usize, field: &'static str },
    /// Anomaly series shorter than the minimum of 3 samples.
    SeriesTooShort { len: usize },
    /// Risk window or cooldown history is empty.
    EmptyWindow,
    /// Policy bundle lacks a recognisable `policy` section.
    MissingPolicySection,
    /// A policy field exists but is not a finite number.
    InvalidPolicyField(&'static str),
    /// Archive subject id is empty.
    EmptySubject,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotARecord(what) => write!(f, "{what} must be a record"),
            Self::EmptySubjectId { index } => write!(f, "request {index}: empty subject id"),
            Self::UnknownActuator { index } => write!(f, "request {index}: unknown actuator"),
            Self::NonFiniteMagnitude { index } => {
                write!(f, "request {index}: magnitude must be a finite number")
            }
            Self::NonPositiveDuration { index } => {
                write!(f, "request {index}: duration must be strictly positive")
            }
            Self::MalformedRequest { index, field } => {
                write!(f, "request {index}: malformed field `{field}`")
            }
            Self::SeriesTooShort { len } => {
                write!(f, "series must have at least 3 samples (got {len})")
            }
            Self::EmptyWindow => write!(f, "window must not be empty"),
            Self::MissingPolicySection => write!(f, "policy bundle has no `policy` section"),
            Self::InvalidPolicyField(field) => write!(f, "policy field `{field}` is not a number"),
            Self::EmptySubject => write!(f, "subject id must not be empty"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<postcard::Error> for Error {
    fn from(_: postcard::Error) -> Self {
        Self::Encoding("postcard serialisation failed")
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_converts_into_error() {
        let e: Error = ValidationError::EmptyWindow.into();
        assert_eq!(e, Error::Validation(ValidationError::EmptyWindow));
    }

    #[test]
    fn display_names_the_offending_request() {
        let e = Error::from(ValidationError::NonPositiveDuration { index: 2 });
        assert_eq!(
            e.to_string(),
            "validation: request 2: duration must be strictly positive"
        );
    }
}

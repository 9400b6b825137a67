//! Closed classification of integration failures
//!
//! Vendor client libraries raise their own error types. Before anything
//! crosses into host-visible state it is mapped onto one of the four
//! [`ErrorKind`]s below; the kind's key doubles as the localized error key
//! shown by config flows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of failure surfaced to the host and the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or transport failure
    CannotConnect,
    /// Credentials rejected or session expired
    CannotAuthenticate,
    /// Remote reachable but returned invalid or incomplete data
    CannotRetrieveData,
    /// Anything not otherwise classified
    Unknown,
}

impl ErrorKind {
    /// The localized error key for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CannotConnect => "cannot_connect",
            ErrorKind::CannotAuthenticate => "cannot_authenticate",
            ErrorKind::CannotRetrieveData => "cannot_retrieve_data",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether the next scheduled refresh may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::CannotConnect | ErrorKind::CannotRetrieveData
        )
    }

    /// Whether the failure requires the user to reauthenticate
    pub fn is_auth(&self) -> bool {
        matches!(self, ErrorKind::CannotAuthenticate)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised error key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown error kind: {0}")]
pub struct UnknownErrorKey(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cannot_connect" => Ok(ErrorKind::CannotConnect),
            "cannot_authenticate" => Ok(ErrorKind::CannotAuthenticate),
            "cannot_retrieve_data" => Ok(ErrorKind::CannotRetrieveData),
            "unknown" => Ok(ErrorKind::Unknown),
            other => Err(UnknownErrorKey(other.to_string())),
        }
    }
}

/// Maps an error onto the closed [`ErrorKind`] set
///
/// Implemented by every vendor adapter error. Implementations must cover
/// all variants and fall back to [`ErrorKind::Unknown`] for anything they
/// do not recognise.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

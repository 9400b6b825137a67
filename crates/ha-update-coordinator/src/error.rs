use std::fmt::Display;

use ha_config_entries::SetupError;
use ha_core::{Classify, ErrorKind};
use thiserror::Error;

/// Outcome of a failed refresh
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpdateError {
    /// Remote unreachable or returned unusable data; the previous snapshot stays
    #[error("Error fetching data ({kind}): {message}")]
    UpdateFailed { kind: ErrorKind, message: String },

    /// Credentials rejected; the coordinator is suspended until reauthentication
    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Coordinator suspended until reauthentication")]
    Suspended,
}

pub type UpdateResult<T> = Result<T, UpdateError>;

impl UpdateError {
    /// Classify a source error
    pub fn from_source<E: Classify + Display>(err: &E) -> Self {
        match err.kind() {
            ErrorKind::CannotAuthenticate => UpdateError::AuthFailed {
                message: err.to_string(),
            },
            kind => UpdateError::UpdateFailed {
                kind,
                message: err.to_string(),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, UpdateError::AuthFailed { .. } | UpdateError::Suspended)
    }
}

impl Classify for UpdateError {
    fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::UpdateFailed { kind, .. } => *kind,
            UpdateError::AuthFailed { .. } | UpdateError::Suspended => {
                ErrorKind::CannotAuthenticate
            }
        }
    }
}

impl From<UpdateError> for SetupError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::UpdateFailed { message, .. } => SetupError::NotReady(message),
            UpdateError::AuthFailed { message } => SetupError::AuthFailed(message),
            UpdateError::Suspended => SetupError::AuthFailed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct Vendor(ErrorKind);

    impl Classify for Vendor {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    #[test]
    fn test_from_source() {
        assert_eq!(
            UpdateError::from_source(&Vendor(ErrorKind::CannotAuthenticate)),
            UpdateError::AuthFailed {
                message: "cannot_authenticate".to_string()
            }
        );
        let err = UpdateError::from_source(&Vendor(ErrorKind::CannotRetrieveData));
        assert_eq!(err.kind(), ErrorKind::CannotRetrieveData);
        assert!(!err.is_auth());
    }

    #[test]
    fn test_into_setup_error() {
        let not_ready: SetupError = UpdateError::UpdateFailed {
            kind: ErrorKind::CannotConnect,
            message: "timed out".to_string(),
        }
        .into();
        assert_eq!(not_ready, SetupError::NotReady("timed out".to_string()));

        let auth: SetupError = UpdateError::Suspended.into();
        assert!(matches!(auth, SetupError::AuthFailed(_)));
    }
}

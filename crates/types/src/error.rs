//! Error types for shardkeeper commands using snafu.
//!
//! Collection commands report failure through a single [`CommandError`] with
//! two kinds:
//! - bad request: the caller asked for something the cluster state forbids
//!   (unknown collection or slice, slice in a non-deletable state)
//! - server error: the command was valid but publishing, waiting, or a
//!   collaborator failed
//!
//! Each variant maps to an [`ErrorCode`] carrying an HTTP-style numeric value,
//! a retryability classification, and a suggested recovery action.

use core::fmt;

use snafu::Snafu;

/// Unified result type for command operations.
pub type Result<T, E = CommandError> = std::result::Result<T, E>;

/// Boxed error attached to server errors as their cause.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable error codes for programmatic error handling.
///
/// | Code | Meaning                                                  |
/// |------|----------------------------------------------------------|
/// | 400  | The request conflicts with current cluster state         |
/// | 500  | The command failed while mutating or observing the cluster |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Invalid request for the current cluster state.
    BadRequest = 400,
    /// Failure inside the command or one of its collaborators.
    ServerError = 500,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            400 => Some(Self::BadRequest),
            500 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    ///
    /// A bad request fails identically until the cluster state changes. A
    /// server error may succeed on retry, for example after a transient
    /// coordination-store outage or once a slow state update lands.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::ServerError)
    }

    /// Suggested recovery action for this error code.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::BadRequest => {
                "Check the collection and shard names and the shard state. Only inactive, \
                 recovering, under-construction, or custom-routed shards can be deleted."
            },
            Self::ServerError => {
                "Inspect the cause and retry. A retry that reports the shard as missing means \
                 the earlier deletion completed."
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Error raised by a collection command.
///
/// # Recovery Guide
///
/// | Variant       | Retryable | Recovery Action                                     |
/// | ------------- | --------- | --------------------------------------------------- |
/// | `BadRequest`  | No        | Fix the request or wait for the slice state to change |
/// | `ServerError` | Yes       | Inspect the cause; retry                            |
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CommandError {
    /// The request is invalid for the current cluster state.
    #[snafu(display("{message}"))]
    BadRequest {
        /// Human-readable reason.
        message: String,
    },

    /// The command failed after validation.
    #[snafu(display("{message}"))]
    ServerError {
        /// Human-readable summary.
        message: String,
        /// Underlying cause.
        source: BoxedError,
    },
}

impl CommandError {
    /// Creates a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Creates a server error wrapping `source`.
    pub fn server_error(
        message: impl Into<String>,
        source: impl Into<BoxedError>,
    ) -> Self {
        Self::ServerError { message: message.into(), source: source.into() }
    }

    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::ServerError { .. } => ErrorCode::ServerError,
        }
    }

    /// Whether this error is retryable. Delegates to [`ErrorCode::is_retryable`].
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Suggested recovery action. Delegates to [`ErrorCode::suggested_action`].
    #[must_use]
    pub const fn suggested_action(&self) -> &'static str {
        self.code().suggested_action()
    }

    /// Returns the error message without the cause chain.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message } | Self::ServerError { message, .. } => message,
        }
    }
}

use std::fmt;

/// Machine-readable error codes for callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StoreUnavailable,
    InvalidRequest,
    Unauthenticated,
    ProposalNotFound,
    CommentNotFound,
    StoreNoResponse,
    StoreWriteFailed,
    CorruptRow,
    ViewsDiverged,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StoreUnavailable => "E1002",
            Self::InvalidRequest => "E2001",
            Self::Unauthenticated => "E2002",
            Self::ProposalNotFound => "E2003",
            Self::CommentNotFound => "E2004",
            Self::StoreNoResponse => "E3001",
            Self::StoreWriteFailed => "E3002",
            Self::CorruptRow => "E3003",
            Self::ViewsDiverged => "E3004",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnavailable => "Store could not be opened",
            Self::InvalidRequest => "Invalid request",
            Self::Unauthenticated => "Caller identity required",
            Self::ProposalNotFound => "Proposal not found",
            Self::CommentNotFound => "Comment not found",
            Self::StoreNoResponse => "Store did not respond in time",
            Self::StoreWriteFailed => "Store operation failed",
            Self::CorruptRow => "Stored row could not be decoded",
            Self::ViewsDiverged => "Replica views diverged",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in civic.toml and retry."),
            Self::StoreUnavailable => Some("Check the --db path and its directory permissions."),
            Self::InvalidRequest | Self::ProposalNotFound | Self::CommentNotFound => None,
            Self::Unauthenticated => {
                Some("Set --user-id/--username, CIVIC_USER_ID/CIVIC_USERNAME, or [identity].")
            }
            Self::StoreNoResponse => Some("Retry after the other writer releases the store."),
            Self::StoreWriteFailed => {
                Some("Retry the operation; writes are idempotent per field.")
            }
            Self::CorruptRow | Self::ViewsDiverged => {
                Some("Run `civic verify`, then `civic repair` to re-derive views.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure raised by the storage session or the fan-out adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The engine stayed busy past its timeout without answering.
    #[error("no response from {table} before timeout")]
    NoResponse { table: &'static str },

    #[error("{op} on {table} failed: {source}")]
    Engine {
        op: &'static str,
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("row in {table} has bad {column}: {reason}")]
    Decode {
        table: &'static str,
        column: &'static str,
        reason: String,
    },

    /// A multi-view write stopped after some views were already written.
    #[error("{op} fan-out stopped at {failed} after {applied:?} were written: {source}")]
    PartialFanOut {
        op: &'static str,
        applied: Vec<&'static str>,
        failed: &'static str,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// True for the timeout class tolerated by bulk purges.
    #[must_use]
    pub const fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoResponse { .. } => ErrorCode::StoreNoResponse,
            Self::Engine { .. } => ErrorCode::StoreWriteFailed,
            Self::Decode { .. } => ErrorCode::CorruptRow,
            Self::PartialFanOut { .. } => ErrorCode::ViewsDiverged,
        }
    }
}

/// Top-level error for service and request-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum CivicError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("caller identity required")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CivicError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Reject text that is empty or only whitespace.
    pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            return Err(Self::validation(field, "must not be empty"));
        }
        Ok(())
    }

    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::InvalidRequest,
            Self::NotFound { entity, .. } if *entity == "comment" => ErrorCode::CommentNotFound,
            Self::NotFound { .. } => ErrorCode::ProposalNotFound,
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::Store(err) => err.code(),
        }
    }

    /// HTTP-class status for the failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthenticated => 401,
            Self::NotFound { .. } => 404,
            Self::Store(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CivicError, ErrorCode, StoreError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::StoreUnavailable,
            ErrorCode::InvalidRequest,
            ErrorCode::Unauthenticated,
            ErrorCode::ProposalNotFound,
            ErrorCode::CommentNotFound,
            ErrorCode::StoreNoResponse,
            ErrorCode::StoreWriteFailed,
            ErrorCode::CorruptRow,
            ErrorCode::ViewsDiverged,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ViewsDiverged.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn statuses_follow_error_class() {
        assert_eq!(CivicError::validation("title", "must not be empty").status(), 400);
        assert_eq!(CivicError::not_found("proposal", "x").status(), 404);
        assert_eq!(CivicError::Unauthenticated.status(), 401);
        let store = CivicError::from(StoreError::NoResponse { table: "t" });
        assert_eq!(store.status(), 500);
        assert_eq!(store.code(), ErrorCode::StoreNoResponse);
    }

    #[test]
    fn blank_text_is_a_validation_error() {
        assert!(CivicError::require_text("comment", "hi").is_ok());
        for blank in ["", "   ", "\t\n"] {
            let err = CivicError::require_text("comment", blank).expect_err("blank");
            assert!(matches!(err, CivicError::Validation { field: "comment", .. }));
        }
    }

    #[test]
    fn comment_not_found_has_its_own_code() {
        assert_eq!(
            CivicError::not_found("comment", "a/b").code(),
            ErrorCode::CommentNotFound
        );
        assert_eq!(
            CivicError::not_found("proposal", "a").code(),
            ErrorCode::ProposalNotFound
        );
    }

    #[test]
    fn partial_fan_out_reports_applied_views() {
        let err = StoreError::PartialFanOut {
            op: "update",
            applied: vec!["proposals_by_id"],
            failed: "proposals_by_user_id",
            source: Box::new(StoreError::NoResponse {
                table: "proposals_by_user_id",
            }),
        };
        let text = err.to_string();
        assert!(text.contains("proposals_by_id"));
        assert!(text.contains("stopped at proposals_by_user_id"));
        assert!(!err.is_no_response());
    }
}

//! Request handling for the proposal and comment endpoints.
//!
//! This layer is transport agnostic. A front end extracts path segments,
//! query parameters and the JSON body, resolves the caller from whatever
//! token it was given, and calls the matching [`Api`] method. Every method
//! returns a [`Reply`] whose envelope is ready to serialize.
//!
//! Identifiers and time bounds are parsed here, so a malformed value is
//! rejected before any service touches the store.

mod comments;
mod proposals;

pub use comments::{CreateCommentRequest, UpdateCommentRequest};
pub use proposals::{CreateProposalRequest, UpdateProposalRequest};

use crate::db::Session;
use crate::error::{CivicError, ErrorCode};
use crate::model::{Author, UserId, UserRef};
use crate::service::Civic;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Message carried by every successful envelope.
pub const SUCCESS: &str = "success";
/// Message carried by every failed envelope.
pub const FAILURE: &str = "false";
/// What callers see for any store failure; detail goes to the log.
pub const STORE_FAILURE_MESSAGE: &str = "Something went wrong";

/// The authenticated user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl Caller {
    #[must_use]
    pub fn author(&self) -> Author {
        Author {
            user_id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    #[must_use]
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

/// Failure payload inside a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: u16,
    pub message: String,
}

/// Response body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    pub message: String,
    pub data: serde_json::Value,
}

/// Status plus envelope, as handed back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub envelope: Envelope,
}

impl Reply {
    fn success(data: serde_json::Value) -> Self {
        Self {
            status: 200,
            envelope: Envelope {
                code: 200,
                message: SUCCESS.to_string(),
                data,
            },
        }
    }

    fn failure(status: u16, message: String) -> Self {
        let body = ErrorBody {
            error_code: status,
            message,
        };
        Self {
            status,
            envelope: Envelope {
                code: status,
                message: FAILURE.to_string(),
                data: serde_json::json!(body),
            },
        }
    }

    fn from_error(err: &CivicError) -> Self {
        let code = err.code();
        match err {
            CivicError::Store(_) => {
                tracing::error!(error = %err, code = %code, "request failed in store");
                Self::failure(err.status(), STORE_FAILURE_MESSAGE.to_string())
            }
            _ => {
                tracing::debug!(error = %err, code = %code, "request rejected");
                Self::failure(err.status(), err.to_string())
            }
        }
    }

    fn from_result<T: Serialize>(result: Result<T, CivicError>) -> Self {
        match result {
            Ok(data) => match serde_json::to_value(data) {
                Ok(value) => Self::success(value),
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        code = %ErrorCode::InternalUnexpected,
                        "response payload failed to serialize"
                    );
                    Self::failure(500, STORE_FAILURE_MESSAGE.to_string())
                }
            },
            Err(err) => Self::from_error(&err),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }

    /// The failure payload, when this reply is a failure.
    #[must_use]
    pub fn error(&self) -> Option<ErrorBody> {
        if self.is_success() {
            return None;
        }
        serde_json::from_value(self.envelope.data.clone()).ok()
    }
}

/// Endpoint handlers bound to one store.
pub struct Api<'c, S> {
    civic: &'c Civic<S>,
}

impl<'c, S: Session> Api<'c, S> {
    #[must_use]
    pub const fn new(civic: &'c Civic<S>) -> Self {
        Self { civic }
    }
}

/// Run an endpoint body and wrap its outcome in a reply.
fn respond<T, F>(handler: F) -> Reply
where
    T: Serialize,
    F: FnOnce() -> Result<T, CivicError>,
{
    Reply::from_result(handler())
}

fn require_caller(caller: Option<&Caller>) -> Result<&Caller, CivicError> {
    caller.ok_or(CivicError::Unauthenticated)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, CivicError> {
    serde_json::from_str(body).map_err(|err| {
        CivicError::validation("body", format!("please check your request again for errors: {err}"))
    })
}

fn required<'a>(field: &'static str, raw: Option<&'a str>) -> Result<&'a str, CivicError> {
    match raw {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CivicError::validation(field, "is required")),
    }
}

/// Parse a `YYYY-MM-DD-HH:MM` query bound as a UTC instant.
///
/// The value must split on `-` into exactly four parts.
///
/// # Errors
///
/// Returns [`CivicError::Validation`] naming `field` for any other shape or
/// an impossible date.
pub fn parse_time_bound(field: &'static str, raw: &str) -> Result<DateTime<Utc>, CivicError> {
    let parts: Vec<&str> = raw.split('-').collect();
    let [year, month, day, clock] = parts.as_slice() else {
        return Err(CivicError::validation(
            field,
            format!("time format error: expected YYYY-MM-DD-HH:MM, got '{raw}'"),
        ));
    };
    let rfc3339 = format!("{year}-{month}-{day}T{clock}:00Z");
    DateTime::parse_from_rfc3339(&rfc3339)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| CivicError::validation(field, format!("time format error: {err}")))
}

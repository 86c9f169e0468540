//! Entity records exchanged between the store adapter and the services.

pub mod comment;
pub mod ids;
pub mod proposal;

pub use comment::Comment;
pub use ids::{CommentId, ProposalId, UserId};
pub use proposal::{Author, Proposal};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current wall-clock time truncated to the store's microsecond precision.
///
/// Truncating up front keeps a freshly built record equal to the same
/// record after it has been written and read back.
#[must_use]
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// A user reference captured into a record at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: UserId,
    pub username: String,
}

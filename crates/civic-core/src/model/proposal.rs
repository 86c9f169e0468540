use super::{ProposalId, UserId, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the author taken when a proposal is created.
///
/// It is copied into every proposal view and never refreshed, so later
/// profile changes do not reach existing proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub user_id: UserId,
    pub username: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
}

impl Author {
    #[must_use]
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

/// A civic proposal as stored in each of its views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    #[serde(rename = "proposal_text")]
    pub text: String,
    #[serde(flatten)]
    pub author: Author,
    pub upvotes: u32,
    pub downvotes: u32,
    #[serde(rename = "no_of_comments")]
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Proposal {
    /// Build a fresh proposal with zeroed counters.
    #[must_use]
    pub fn new(title: String, text: String, author: Author, at: DateTime<Utc>) -> Self {
        Self {
            id: ProposalId::generate(),
            title,
            text,
            author,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            created_at: at,
            last_updated: at,
        }
    }
}

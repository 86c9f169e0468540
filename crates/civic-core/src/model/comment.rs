use super::{CommentId, ProposalId, UserId, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment under a proposal.
///
/// `posted_by_*` is the proposal author's identity copied in at comment
/// time; `commenter_*` is whoever wrote the comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub proposal_id: ProposalId,
    #[serde(rename = "id")]
    pub comment_id: CommentId,
    #[serde(rename = "comment")]
    pub text: String,
    #[serde(rename = "user_posted_id")]
    pub posted_by_id: UserId,
    #[serde(rename = "user_posted")]
    pub posted_by_username: String,
    #[serde(rename = "user_commented_id")]
    pub commenter_id: UserId,
    #[serde(rename = "user_commented")]
    pub commenter_username: String,
    pub upvotes: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Comment {
    #[must_use]
    pub fn new(
        proposal_id: ProposalId,
        text: String,
        posted_by: UserRef,
        commenter: UserRef,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            proposal_id,
            comment_id: CommentId::generate(),
            text,
            posted_by_id: posted_by.user_id,
            posted_by_username: posted_by.username,
            commenter_id: commenter.user_id,
            commenter_username: commenter.username,
            upvotes: 0,
            created_at: at,
            last_updated: at,
        }
    }
}

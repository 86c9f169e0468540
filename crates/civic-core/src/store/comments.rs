//! Comment views and their row mapping.

use super::{Replicated, RowReader, View, micros};
use crate::db::schema::{COMMENTS_BY_PROPOSAL_AND_COMMENT_ID, COMMENTS_BY_PROPOSAL_ID};
use crate::db::{KeyPart, Row};
use crate::error::{CivicError, StoreError};
use crate::model::{Comment, CommentId, ProposalId};
use rusqlite::types::Value;
use std::fmt;

/// Canonical view: exact lookup by proposal and comment id.
pub const BY_PROPOSAL_AND_COMMENT: View = View {
    table: COMMENTS_BY_PROPOSAL_AND_COMMENT_ID,
    key: &["proposal_id", "id"],
};

/// A proposal's comments in creation order.
pub const BY_PROPOSAL: View = View {
    table: COMMENTS_BY_PROPOSAL_ID,
    key: &["proposal_id", "created_at_us", "id"],
};

/// Identity of a comment: the proposal partition plus the comment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommentKey {
    pub proposal_id: ProposalId,
    pub comment_id: CommentId,
}

impl fmt::Display for CommentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.proposal_id, self.comment_id)
    }
}

/// Comment columns that may change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentField {
    Text,
    Upvotes,
    LastUpdated,
}

/// The partition holding every comment of `proposal_id`.
#[must_use]
pub fn partition(proposal_id: ProposalId) -> Vec<KeyPart> {
    vec![("proposal_id", Value::Text(proposal_id.to_string()))]
}

impl Replicated for Comment {
    type Key = CommentKey;
    type Field = CommentField;

    const ENTITY: &'static str = "comment";
    const VIEWS: &'static [View] = &[BY_PROPOSAL_AND_COMMENT, BY_PROPOSAL];

    fn key(&self) -> CommentKey {
        CommentKey {
            proposal_id: self.proposal_id,
            comment_id: self.comment_id,
        }
    }

    fn canonical_key(key: &CommentKey) -> Vec<KeyPart> {
        vec![
            ("proposal_id", Value::Text(key.proposal_id.to_string())),
            ("id", Value::Text(key.comment_id.to_string())),
        ]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("proposal_id", self.proposal_id.to_string())
            .with("id", self.comment_id.to_string())
            .with("comment", self.text.clone())
            .with("user_posted_id", self.posted_by_id.to_string())
            .with("user_posted_username", self.posted_by_username.clone())
            .with("user_commented_id", self.commenter_id.to_string())
            .with("user_commented_username", self.commenter_username.clone())
            .with("upvotes", i64::from(self.upvotes))
            .with("created_at_us", micros(self.created_at))
            .with("last_updated_us", micros(self.last_updated))
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            proposal_id: row.id("proposal_id")?,
            comment_id: row.id("id")?,
            text: row.text("comment")?,
            posted_by_id: row.id("user_posted_id")?,
            posted_by_username: row.text("user_posted_username")?,
            commenter_id: row.id("user_commented_id")?,
            commenter_username: row.text("user_commented_username")?,
            upvotes: row.counter("upvotes")?,
            created_at: row.timestamp("created_at_us")?,
            last_updated: row.timestamp("last_updated_us")?,
        })
    }

    fn column(field: CommentField) -> &'static str {
        match field {
            CommentField::Text => "comment",
            CommentField::Upvotes => "upvotes",
            CommentField::LastUpdated => "last_updated_us",
        }
    }

    fn validate(&self) -> Result<(), CivicError> {
        CivicError::require_text("comment", &self.text)?;
        if self.commenter_id.is_nil() {
            return Err(CivicError::validation("user_commented_id", "commenter must be set"));
        }
        Ok(())
    }
}

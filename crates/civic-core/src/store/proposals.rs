//! Proposal views and their row mapping.

use super::{Replicated, RowReader, View, micros};
use crate::db::schema::{PROPOSALS_BY_CREATED_AT, PROPOSALS_BY_ID, PROPOSALS_BY_USER_ID};
use crate::db::{KeyPart, Row};
use crate::error::{CivicError, StoreError};
use crate::model::{Author, Proposal, ProposalId};
use rusqlite::types::Value;

/// Canonical view: exact lookup by id.
pub const BY_ID: View = View {
    table: PROPOSALS_BY_ID,
    key: &["id"],
};

/// One partition per author, newest last within it.
pub const BY_USER: View = View {
    table: PROPOSALS_BY_USER_ID,
    key: &["user_id", "created_at_us", "id"],
};

/// Global creation-time order, used for listing and time ranges.
pub const BY_CREATED_AT: View = View {
    table: PROPOSALS_BY_CREATED_AT,
    key: &["created_at_us", "id"],
};

/// Proposal columns that may change after creation.
///
/// Key columns and the author snapshot are absent on purpose: they can
/// only be written by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalField {
    Title,
    Text,
    Upvotes,
    Downvotes,
    CommentCount,
    LastUpdated,
}

impl Replicated for Proposal {
    type Key = ProposalId;
    type Field = ProposalField;

    const ENTITY: &'static str = "proposal";
    const VIEWS: &'static [View] = &[BY_ID, BY_USER, BY_CREATED_AT];

    fn key(&self) -> ProposalId {
        self.id
    }

    fn canonical_key(key: &ProposalId) -> Vec<KeyPart> {
        vec![("id", Value::Text(key.to_string()))]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id.to_string())
            .with("title", self.title.clone())
            .with("proposal_text", self.text.clone())
            .with("user_id", self.author.user_id.to_string())
            .with("username", self.author.username.clone())
            .with("firstname", self.author.first_name.clone())
            .with("lastname", self.author.last_name.clone())
            .with("upvotes", i64::from(self.upvotes))
            .with("downvotes", i64::from(self.downvotes))
            .with("no_of_comments", i64::from(self.comment_count))
            .with("created_at_us", micros(self.created_at))
            .with("last_updated_us", micros(self.last_updated))
    }

    fn from_row(row: &RowReader<'_>) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id("id")?,
            title: row.text("title")?,
            text: row.text("proposal_text")?,
            author: Author {
                user_id: row.id("user_id")?,
                username: row.text("username")?,
                first_name: row.text("firstname")?,
                last_name: row.text("lastname")?,
            },
            upvotes: row.counter("upvotes")?,
            downvotes: row.counter("downvotes")?,
            comment_count: row.counter("no_of_comments")?,
            created_at: row.timestamp("created_at_us")?,
            last_updated: row.timestamp("last_updated_us")?,
        })
    }

    fn column(field: ProposalField) -> &'static str {
        match field {
            ProposalField::Title => "title",
            ProposalField::Text => "proposal_text",
            ProposalField::Upvotes => "upvotes",
            ProposalField::Downvotes => "downvotes",
            ProposalField::CommentCount => "no_of_comments",
            ProposalField::LastUpdated => "last_updated_us",
        }
    }

    fn validate(&self) -> Result<(), CivicError> {
        CivicError::require_text("title", &self.title)?;
        CivicError::require_text("proposal_text", &self.text)?;
        if self.author.user_id.is_nil() {
            return Err(CivicError::validation("user_id", "author must be set"));
        }
        Ok(())
    }
}

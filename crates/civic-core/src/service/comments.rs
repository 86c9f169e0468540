use super::newest_first;
use super::proposals::{CommentCountAdjustment, ProposalService};
use crate::db::{Order, Predicate, Session};
use crate::error::CivicError;
use crate::model::{self, Comment, ProposalId, UserRef};
use crate::store::comments::{self, BY_PROPOSAL, CommentField, CommentKey};
use crate::store::{Change, PurgeReport, ReplicaStore, Replicated, micros};
use rusqlite::types::Value;

/// Comment lifecycle over both comment views, keeping the parent's
/// `no_of_comments` in step.
pub struct CommentService<'s, S: ?Sized> {
    session: &'s S,
}

impl<'s, S: Session + ?Sized> CommentService<'s, S> {
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self { session }
    }

    const fn store(&self) -> ReplicaStore<'s, S, Comment> {
        ReplicaStore::new(self.session)
    }

    const fn proposals(&self) -> ProposalService<'s, S> {
        ProposalService::new(self.session)
    }

    /// Comment on a live proposal and bump its comment count.
    ///
    /// # Errors
    ///
    /// Validation for blank text or an unset commenter (before any store
    /// access), `NotFound` for a missing proposal, store failures.
    pub fn create(
        &self,
        proposal_id: ProposalId,
        text: &str,
        commenter: UserRef,
    ) -> Result<Comment, CivicError> {
        CivicError::require_text("comment", text)?;
        if commenter.user_id.is_nil() {
            return Err(CivicError::validation("user_commented_id", "commenter must be set"));
        }

        let parent = self.proposals().get(proposal_id)?;
        let comment = Comment::new(
            proposal_id,
            text.to_string(),
            parent.author.user_ref(),
            commenter,
            model::now(),
        );
        self.store().insert(&comment)?;
        self.proposals()
            .adjust_comment_count(proposal_id, CommentCountAdjustment::Increment)?;
        tracing::info!(key = %comment.key(), "comment created");
        Ok(comment)
    }

    /// # Errors
    ///
    /// `NotFound` when the comment does not exist.
    pub fn get(&self, key: CommentKey) -> Result<Comment, CivicError> {
        self.store().get(&key)
    }

    /// A proposal's comments, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn list_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<Comment>, CivicError> {
        let comments = self.store().scan(
            BY_PROPOSAL,
            &[Predicate::Eq(
                "proposal_id",
                Value::Text(proposal_id.to_string()),
            )],
            Some(Order::Asc("created_at_us")),
        )?;
        Ok(newest_first(comments))
    }

    /// Replace a comment's text. Its key and creation time never change.
    ///
    /// # Errors
    ///
    /// Validation for blank text, `NotFound`, store failures.
    pub fn update(&self, key: CommentKey, text: &str) -> Result<Comment, CivicError> {
        CivicError::require_text("comment", text)?;
        let at = model::now();
        let before = self.store().update(
            &key,
            &[
                Change::Set(CommentField::Text, Value::Text(text.to_string())),
                Change::Set(CommentField::LastUpdated, micros(at)),
            ],
        )?;
        tracing::info!(%key, "comment updated");
        Ok(Comment {
            text: text.to_string(),
            last_updated: at,
            ..before
        })
    }

    /// Delete one comment and decrement its parent's count.
    ///
    /// # Errors
    ///
    /// `NotFound` or store failures.
    pub fn delete(&self, key: CommentKey) -> Result<Comment, CivicError> {
        let deleted = self.store().delete(&key)?;
        self.proposals()
            .adjust_comment_count(key.proposal_id, CommentCountAdjustment::Decrement)?;
        tracing::info!(%key, "comment deleted");
        Ok(deleted)
    }

    /// Delete every comment under a proposal and reset its count.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn delete_all_for_proposal(&self, proposal_id: ProposalId) -> Result<(), CivicError> {
        self.purge_partition(proposal_id)?;
        self.proposals()
            .adjust_comment_count(proposal_id, CommentCountAdjustment::Reset)?;
        tracing::info!(%proposal_id, "all comments of proposal deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` or store failures.
    pub fn upvote(&self, key: CommentKey) -> Result<(), CivicError> {
        self.store()
            .update(&key, &[Change::Add(CommentField::Upvotes, 1)])?;
        tracing::info!(%key, "comment upvoted");
        Ok(())
    }

    pub(crate) fn purge_partition(&self, proposal_id: ProposalId) -> Result<(), CivicError> {
        self.store()
            .delete_partition(&comments::partition(proposal_id))
    }

    pub(crate) fn purge_all(&self) -> Result<PurgeReport, CivicError> {
        self.store().purge()
    }
}

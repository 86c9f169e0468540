use super::comments::CommentService;
use super::newest_first;
use crate::db::{Order, Predicate, Session};
use crate::error::CivicError;
use crate::model::{self, Author, Proposal, ProposalId, UserId};
use crate::store::proposals::{BY_CREATED_AT, BY_USER, ProposalField};
use crate::store::{Change, PurgeReport, ReplicaStore, micros};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// How a comment-service operation moves a proposal's `no_of_comments`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentCountAdjustment {
    Increment,
    Decrement,
    Reset,
}

impl CommentCountAdjustment {
    fn change(self) -> Change<ProposalField> {
        match self {
            Self::Increment => Change::Add(ProposalField::CommentCount, 1),
            Self::Decrement => Change::Add(ProposalField::CommentCount, -1),
            Self::Reset => Change::Set(ProposalField::CommentCount, Value::Integer(0)),
        }
    }
}

/// Proposal lifecycle over all proposal views.
pub struct ProposalService<'s, S: ?Sized> {
    session: &'s S,
}

impl<'s, S: Session + ?Sized> ProposalService<'s, S> {
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self { session }
    }

    const fn store(&self) -> ReplicaStore<'s, S, Proposal> {
        ReplicaStore::new(self.session)
    }

    const fn comments(&self) -> CommentService<'s, S> {
        CommentService::new(self.session)
    }

    /// Create a proposal with zeroed counters.
    ///
    /// # Errors
    ///
    /// Validation when title or text is blank or the author is unset;
    /// store failures otherwise.
    pub fn create(&self, title: &str, text: &str, author: Author) -> Result<Proposal, CivicError> {
        let proposal = Proposal::new(title.to_string(), text.to_string(), author, model::now());
        self.store().insert(&proposal)?;
        tracing::info!(id = %proposal.id, user_id = %proposal.author.user_id, "proposal created");
        Ok(proposal)
    }

    /// # Errors
    ///
    /// `NotFound` when no proposal has this id.
    pub fn get(&self, id: ProposalId) -> Result<Proposal, CivicError> {
        self.store().get(&id)
    }

    /// Every proposal, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn list_all(&self) -> Result<Vec<Proposal>, CivicError> {
        let proposals = self
            .store()
            .scan(BY_CREATED_AT, &[], Some(Order::Asc("created_at_us")))?;
        Ok(newest_first(proposals))
    }

    /// One author's proposals, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn list_by_author(&self, user_id: UserId) -> Result<Vec<Proposal>, CivicError> {
        let proposals = self.store().scan(
            BY_USER,
            &[Predicate::Eq("user_id", Value::Text(user_id.to_string()))],
            Some(Order::Asc("created_at_us")),
        )?;
        Ok(newest_first(proposals))
    }

    /// Proposals created within `[from, to]`, newest first.
    ///
    /// An inverted range matches nothing.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn list_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, CivicError> {
        if from > to {
            return Ok(Vec::new());
        }
        let proposals = self.store().scan(
            BY_CREATED_AT,
            &[
                Predicate::AtLeast("created_at_us", micros(from)),
                Predicate::AtMost("created_at_us", micros(to)),
            ],
            Some(Order::Asc("created_at_us")),
        )?;
        Ok(newest_first(proposals))
    }

    /// Replace title and text, leaving counters alone.
    ///
    /// # Errors
    ///
    /// Validation for blank input (checked before any read), `NotFound`,
    /// or store failures.
    pub fn update(&self, id: ProposalId, title: &str, text: &str) -> Result<Proposal, CivicError> {
        CivicError::require_text("title", title)?;
        CivicError::require_text("proposal_text", text)?;
        let at = model::now();
        let before = self.store().update(
            &id,
            &[
                Change::Set(ProposalField::Title, Value::Text(title.to_string())),
                Change::Set(ProposalField::Text, Value::Text(text.to_string())),
                Change::Set(ProposalField::LastUpdated, micros(at)),
            ],
        )?;
        tracing::info!(%id, "proposal updated");
        Ok(Proposal {
            title: title.to_string(),
            text: text.to_string(),
            last_updated: at,
            ..before
        })
    }

    /// Delete a proposal from every view, then every comment under it.
    ///
    /// # Errors
    ///
    /// `NotFound` before anything is deleted; store failures from either
    /// step. A failure while purging comments leaves the proposal deleted
    /// and its comments orphaned until repaired.
    pub fn delete(&self, id: ProposalId) -> Result<Proposal, CivicError> {
        let deleted = self.store().delete(&id)?;
        self.comments().purge_partition(id)?;
        tracing::info!(%id, "proposal deleted with its comments");
        Ok(deleted)
    }

    /// Clear every proposal and every comment.
    ///
    /// # Errors
    ///
    /// The first store failure that is not a timeout.
    pub fn delete_all(&self) -> Result<PurgeReport, CivicError> {
        let mut report = self.store().purge()?;
        report.merge(self.comments().purge_all()?);
        tracing::info!(
            cleared = report.cleared.len(),
            timed_out = report.timed_out.len(),
            "all proposals and comments purged"
        );
        Ok(report)
    }

    /// # Errors
    ///
    /// `NotFound` or store failures.
    pub fn upvote(&self, id: ProposalId) -> Result<(), CivicError> {
        self.store()
            .update(&id, &[Change::Add(ProposalField::Upvotes, 1)])?;
        tracing::info!(%id, "proposal upvoted");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` or store failures.
    pub fn downvote(&self, id: ProposalId) -> Result<(), CivicError> {
        self.store()
            .update(&id, &[Change::Add(ProposalField::Downvotes, 1)])?;
        tracing::info!(%id, "proposal downvoted");
        Ok(())
    }

    /// Keep `no_of_comments` in step with the comment views.
    ///
    /// A proposal that no longer exists has nothing to keep in step, so a
    /// missing parent is logged and ignored.
    pub(crate) fn adjust_comment_count(
        &self,
        id: ProposalId,
        adjustment: CommentCountAdjustment,
    ) -> Result<(), CivicError> {
        match self.store().update(&id, &[adjustment.change()]) {
            Ok(_) => {
                tracing::debug!(%id, ?adjustment, "comment count adjusted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                tracing::warn!(
                    %id,
                    ?adjustment,
                    "comment count adjustment skipped: proposal is gone"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

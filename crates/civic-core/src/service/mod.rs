//! Proposal and comment lifecycles on top of the store adapter.
//!
//! Services never talk to a table directly. Every write goes through
//! [`crate::store::ReplicaStore`], which resolves the canonical row first
//! and then fans the change out to each view.

pub mod comments;
pub mod proposals;

pub use comments::CommentService;
pub use proposals::{CommentCountAdjustment, ProposalService};

use crate::consistency::{self, RepairReport, VerifyReport};
use crate::db::Session;
use crate::error::CivicError;
use crate::model::{Comment, Proposal};
use crate::store::Replicated;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Records that carry their creation instant.
trait Created {
    fn created_at(&self) -> DateTime<Utc>;
}

impl Created for Proposal {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Created for Comment {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Newest first; identity breaks ties between records created in the same
/// microsecond.
fn newest_first<E: Replicated + Created>(mut records: Vec<E>) -> Vec<E> {
    records.sort_by_key(|record| Reverse((record.created_at(), record.key())));
    records
}

/// Owns the store session and hands out services bound to it.
#[derive(Debug)]
pub struct Civic<S> {
    session: S,
}

impl<S: Session> Civic<S> {
    #[must_use]
    pub const fn new(session: S) -> Self {
        Self { session }
    }

    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    #[must_use]
    pub const fn proposals(&self) -> ProposalService<'_, S> {
        ProposalService::new(&self.session)
    }

    #[must_use]
    pub const fn comments(&self) -> CommentService<'_, S> {
        CommentService::new(&self.session)
    }

    /// Compare every view against its canonical view.
    ///
    /// # Errors
    ///
    /// Store failures while scanning.
    pub fn verify(&self) -> Result<VerifyReport, CivicError> {
        consistency::verify(&self.session)
    }

    /// Re-derive every view from its canonical view.
    ///
    /// # Errors
    ///
    /// Store failures while rewriting.
    pub fn repair(&self) -> Result<RepairReport, CivicError> {
        consistency::repair(&self.session)
    }
}

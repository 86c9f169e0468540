//! Detect and repair divergence between views.
//!
//! A fan-out that stops part way leaves views disagreeing. The canonical
//! view of each entity type is taken as the source of truth: [`verify`]
//! reports every way the other views differ from it, and [`repair`]
//! rewrites them until they agree. Comment counts are recomputed from the
//! canonical comment view, and comments whose proposal is gone are
//! removed.

use crate::db::Session;
use crate::error::CivicError;
use crate::model::{Comment, Proposal, ProposalId};
use crate::store::comments::{self as comment_views, CommentKey};
use crate::store::proposals::ProposalField;
use crate::store::{Change, ReplicaStore, Replicated};
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One way the stored views disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// A canonical record has no row in `table`.
    MissingRow {
        entity: &'static str,
        table: &'static str,
        key: String,
    },
    /// `table` holds a record the canonical view does not.
    OrphanRow {
        entity: &'static str,
        table: &'static str,
        key: String,
    },
    FieldMismatch {
        entity: &'static str,
        table: &'static str,
        key: String,
        columns: Vec<String>,
    },
    /// A comment whose proposal no longer exists.
    OrphanComment { key: String },
    CommentCountMismatch {
        proposal_id: ProposalId,
        recorded: u32,
        actual: u32,
    },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRow { entity, table, key } => {
                write!(f, "{entity} {key} missing from {table}")
            }
            Self::OrphanRow { entity, table, key } => {
                write!(f, "{entity} {key} in {table} has no canonical row")
            }
            Self::FieldMismatch {
                entity,
                table,
                key,
                columns,
            } => write!(
                f,
                "{entity} {key} in {table} differs in {}",
                columns.join(", ")
            ),
            Self::OrphanComment { key } => write!(f, "comment {key} belongs to no proposal"),
            Self::CommentCountMismatch {
                proposal_id,
                recorded,
                actual,
            } => write!(
                f,
                "proposal {proposal_id} records {recorded} comments but has {actual}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub proposals: usize,
    pub comments: usize,
    pub divergences: Vec<Divergence>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Rows written into a view from the canonical record.
    pub rows_rewritten: usize,
    /// View rows deleted because they had no canonical record or were stale.
    pub rows_removed: usize,
    pub orphan_comments_removed: usize,
    pub counts_corrected: usize,
}

impl RepairReport {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.rows_rewritten == 0
            && self.rows_removed == 0
            && self.orphan_comments_removed == 0
            && self.counts_corrected == 0
    }
}

fn canonical<S, E>(store: ReplicaStore<'_, S, E>) -> Result<BTreeMap<E::Key, E>, CivicError>
where
    S: Session + ?Sized,
    E: Replicated,
{
    let records = store.scan(E::canonical_view(), &[], None)?;
    Ok(records.into_iter().map(|e| (e.key(), e)).collect())
}

fn check_views<S, E>(
    store: ReplicaStore<'_, S, E>,
    canonical: &BTreeMap<E::Key, E>,
    out: &mut Vec<Divergence>,
) -> Result<(), CivicError>
where
    S: Session + ?Sized,
    E: Replicated,
{
    for view in E::VIEWS.iter().skip(1) {
        let mut seen = BTreeSet::new();
        for record in store.scan(*view, &[], None)? {
            let key = record.key();
            let Some(expected) = canonical.get(&key) else {
                out.push(Divergence::OrphanRow {
                    entity: E::ENTITY,
                    table: view.table,
                    key: key.to_string(),
                });
                continue;
            };
            let columns = expected.to_row().diff(&record.to_row());
            if !columns.is_empty() {
                out.push(Divergence::FieldMismatch {
                    entity: E::ENTITY,
                    table: view.table,
                    key: key.to_string(),
                    columns,
                });
            }
            seen.insert(key);
        }
        for key in canonical.keys().filter(|key| !seen.contains(*key)) {
            out.push(Divergence::MissingRow {
                entity: E::ENTITY,
                table: view.table,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

fn rewrite_views<S, E>(
    store: ReplicaStore<'_, S, E>,
    canonical: &BTreeMap<E::Key, E>,
    report: &mut RepairReport,
) -> Result<(), CivicError>
where
    S: Session + ?Sized,
    E: Replicated,
{
    let session = store.session();
    for view in E::VIEWS.iter().skip(1) {
        let mut good = BTreeSet::new();
        for record in store.scan(*view, &[], None)? {
            let row = record.to_row();
            let key = record.key();
            if canonical.get(&key).is_some_and(|expected| expected.to_row() == row) {
                good.insert(key);
                continue;
            }
            session.delete(view.table, &view.address(&row))?;
            report.rows_removed += 1;
        }
        for (key, record) in canonical {
            if !good.contains(key) {
                session.upsert(view.table, &record.to_row())?;
                report.rows_rewritten += 1;
            }
        }
    }
    Ok(())
}

fn comment_counts(comments: &BTreeMap<CommentKey, Comment>) -> BTreeMap<ProposalId, u32> {
    let mut counts = BTreeMap::new();
    for key in comments.keys() {
        *counts.entry(key.proposal_id).or_insert(0_u32) += 1;
    }
    counts
}

/// Report every divergence without changing anything.
///
/// # Errors
///
/// Store failures, including rows that cannot be decoded.
pub fn verify<S: Session + ?Sized>(session: &S) -> Result<VerifyReport, CivicError> {
    let proposal_store = ReplicaStore::<S, Proposal>::new(session);
    let comment_store = ReplicaStore::<S, Comment>::new(session);
    let proposals = canonical(proposal_store)?;
    let comments = canonical(comment_store)?;

    let mut divergences = Vec::new();
    check_views(proposal_store, &proposals, &mut divergences)?;
    check_views(comment_store, &comments, &mut divergences)?;

    for key in comments.keys() {
        if !proposals.contains_key(&key.proposal_id) {
            divergences.push(Divergence::OrphanComment {
                key: key.to_string(),
            });
        }
    }

    let counts = comment_counts(&comments);
    for (id, proposal) in &proposals {
        let actual = counts.get(id).copied().unwrap_or(0);
        if proposal.comment_count != actual {
            divergences.push(Divergence::CommentCountMismatch {
                proposal_id: *id,
                recorded: proposal.comment_count,
                actual,
            });
        }
    }

    if divergences.is_empty() {
        tracing::info!(proposals = proposals.len(), comments = comments.len(), "views consistent");
    } else {
        tracing::warn!(count = divergences.len(), "views diverge");
    }
    Ok(VerifyReport {
        proposals: proposals.len(),
        comments: comments.len(),
        divergences,
    })
}

/// Rewrite every view from its canonical view and fix comment counts.
///
/// Running it on consistent views changes nothing.
///
/// # Errors
///
/// Store failures. A failure part way leaves the views no worse than
/// before; running repair again continues the work.
pub fn repair<S: Session + ?Sized>(session: &S) -> Result<RepairReport, CivicError> {
    let proposal_store = ReplicaStore::<S, Proposal>::new(session);
    let comment_store = ReplicaStore::<S, Comment>::new(session);
    let mut report = RepairReport::default();

    let proposals = canonical(proposal_store)?;
    rewrite_views(proposal_store, &proposals, &mut report)?;

    let mut orphaned: BTreeMap<ProposalId, usize> = BTreeMap::new();
    for key in canonical(comment_store)?.keys() {
        if !proposals.contains_key(&key.proposal_id) {
            *orphaned.entry(key.proposal_id).or_default() += 1;
        }
    }
    for (id, count) in orphaned {
        comment_store.delete_partition(&comment_views::partition(id))?;
        tracing::warn!(proposal_id = %id, count, "removed comments of a missing proposal");
        report.orphan_comments_removed += count;
    }

    let comments = canonical(comment_store)?;
    rewrite_views(comment_store, &comments, &mut report)?;

    let counts = comment_counts(&comments);
    for (id, proposal) in &proposals {
        let actual = counts.get(id).copied().unwrap_or(0);
        if proposal.comment_count != actual {
            proposal_store.update(
                id,
                &[Change::Set(
                    ProposalField::CommentCount,
                    Value::Integer(i64::from(actual)),
                )],
            )?;
            report.counts_corrected += 1;
        }
    }

    tracing::info!(?report, "repair finished");
    Ok(report)
}

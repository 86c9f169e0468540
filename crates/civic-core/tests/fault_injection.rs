//! Fault-injection tests for the fan-out adapter.
//!
//! A `Session` wrapper records every primitive call and can fail one
//! chosen (operation, table) pair, which lets these tests cover:
//! - malformed identifiers never reaching the store
//! - a failure on the first view leaving every view untouched
//! - a failure part way through a fan-out surfacing as a partial write
//! - purges continuing past timeouts and stopping on other errors

use std::cell::RefCell;

use civic_core::Civic;
use civic_core::api::{Api, Caller};
use civic_core::db::schema::{
    COMMENTS_BY_PROPOSAL_AND_COMMENT_ID, COMMENTS_BY_PROPOSAL_ID, PROPOSALS_BY_CREATED_AT,
    PROPOSALS_BY_ID, PROPOSALS_BY_USER_ID,
};
use civic_core::db::{self, Assignment, KeyPart, Order, Predicate, Row, Session, SqliteSession};
use civic_core::error::{CivicError, StoreError};
use civic_core::model::{Author, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    NoResponse,
    Engine,
}

struct FaultySession {
    inner: SqliteSession,
    calls: RefCell<Vec<(&'static str, &'static str)>>,
    fault: RefCell<Option<(&'static str, &'static str, Fault)>>,
}

impl FaultySession {
    fn new() -> Self {
        Self {
            inner: db::open_in_memory().expect("open store"),
            calls: RefCell::new(Vec::new()),
            fault: RefCell::new(None),
        }
    }

    fn fail(&self, op: &'static str, table: &'static str, fault: Fault) {
        *self.fault.borrow_mut() = Some((op, table, fault));
    }

    fn heal(&self) {
        *self.fault.borrow_mut() = None;
    }

    fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn writes(&self) -> Vec<(&'static str, &'static str)> {
        self.calls
            .borrow()
            .iter()
            .copied()
            .filter(|(op, _)| *op != "select")
            .collect()
    }

    fn enter(&self, op: &'static str, table: &'static str) -> Result<(), StoreError> {
        self.calls.borrow_mut().push((op, table));
        match *self.fault.borrow() {
            Some((fail_op, fail_table, fault)) if fail_op == op && fail_table == table => {
                Err(match fault {
                    Fault::NoResponse => StoreError::NoResponse { table },
                    Fault::Engine => StoreError::Engine {
                        op,
                        table,
                        source: rusqlite::Error::InvalidQuery,
                    },
                })
            }
            _ => Ok(()),
        }
    }
}

impl Session for FaultySession {
    fn upsert(&self, table: &'static str, row: &Row) -> Result<(), StoreError> {
        self.enter("upsert", table)?;
        self.inner.upsert(table, row)
    }

    fn select(
        &self,
        table: &'static str,
        predicates: &[Predicate],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        self.enter("select", table)?;
        self.inner.select(table, predicates, order, limit)
    }

    fn update(
        &self,
        table: &'static str,
        assignments: &[Assignment],
        key: &[KeyPart],
    ) -> Result<(), StoreError> {
        self.enter("update", table)?;
        self.inner.update(table, assignments, key)
    }

    fn delete(&self, table: &'static str, key: &[KeyPart]) -> Result<(), StoreError> {
        self.enter("delete", table)?;
        self.inner.delete(table, key)
    }

    fn truncate(&self, table: &'static str) -> Result<(), StoreError> {
        self.enter("truncate", table)?;
        self.inner.truncate(table)
    }
}

fn caller() -> Caller {
    Caller {
        user_id: UserId::from_uuid(uuid::Uuid::now_v7()),
        username: "ada".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

fn author() -> Author {
    caller().author()
}

fn count_rows(session: &FaultySession, table: &'static str) -> usize {
    session
        .inner
        .select(table, &[], None, None)
        .expect("select")
        .len()
}

#[test]
fn malformed_identifiers_never_touch_the_store() {
    let civic = Civic::new(FaultySession::new());
    let api = Api::new(&civic);
    let bad = "not-a-uuid";

    let replies = [
        api.get_proposal(bad),
        api.get_proposals_by_user(bad),
        api.update_proposal(r#"{"id":"123","title":"t","proposal":"b"}"#),
        api.delete_proposal(bad),
        api.upvote_proposal(bad),
        api.downvote_proposal(bad),
        api.create_comment(Some(&caller()), r#"{"proposal_id":"x","comment":"hi"}"#),
        api.get_comments(bad),
        api.get_comment(Some(bad), Some(bad)),
        api.update_comment(r#"{"proposal_id":"x","comment_id":"y","updated_comment":"z"}"#),
        api.delete_comment(Some(bad), None),
        api.delete_proposal_comments(bad),
        api.upvote_comment(None, Some(bad)),
        api.get_proposals_by_time(Some("2022-06-23"), Some("2022-06-24-10:00")),
    ];

    for reply in &replies {
        assert_eq!(reply.status, 400, "{reply:?}");
    }
    assert_eq!(civic.session().call_count(), 0);
}

#[test]
fn validation_failures_never_touch_the_store() {
    let civic = Civic::new(FaultySession::new());
    let err = civic
        .proposals()
        .create("", "body", author())
        .expect_err("blank title");
    assert!(matches!(err, CivicError::Validation { .. }));
    assert_eq!(civic.session().call_count(), 0);
}

#[test]
fn failure_on_first_view_writes_nothing() {
    let civic = Civic::new(FaultySession::new());
    civic
        .session()
        .fail("upsert", PROPOSALS_BY_ID, Fault::Engine);

    let err = civic
        .proposals()
        .create("t", "b", author())
        .expect_err("first view fails");
    assert!(matches!(err, CivicError::Store(StoreError::Engine { .. })));
    for table in [PROPOSALS_BY_ID, PROPOSALS_BY_USER_ID, PROPOSALS_BY_CREATED_AT] {
        assert_eq!(count_rows(civic.session(), table), 0, "{table}");
    }
}

#[test]
fn mid_fan_out_failure_is_reported_as_partial() {
    let civic = Civic::new(FaultySession::new());
    let p = civic.proposals().create("t", "b", author()).expect("create");
    civic
        .session()
        .fail("update", PROPOSALS_BY_USER_ID, Fault::Engine);

    let err = civic.proposals().upvote(p.id).expect_err("partial");
    match err {
        CivicError::Store(StoreError::PartialFanOut {
            op,
            applied,
            failed,
            ..
        }) => {
            assert_eq!(op, "update");
            assert_eq!(applied, vec![PROPOSALS_BY_ID]);
            assert_eq!(failed, PROPOSALS_BY_USER_ID);
        }
        other => panic!("expected partial fan-out, got {other:?}"),
    }
    assert_eq!(err_status(&civic, &p.id.to_string()), 500);

    civic.session().heal();
    let report = civic.verify().expect("verify");
    assert!(!report.is_consistent());
    civic.repair().expect("repair");
    assert!(civic.verify().expect("verify").is_consistent());
    assert_eq!(civic.proposals().get(p.id).expect("get").upvotes, 1);
}

fn err_status(civic: &Civic<FaultySession>, id: &str) -> u16 {
    civic.session().fail("update", PROPOSALS_BY_ID, Fault::Engine);
    let status = Api::new(civic).upvote_proposal(id).status;
    civic.session().heal();
    status
}

#[test]
fn not_found_lookup_precedes_every_write() {
    let civic = Civic::new(FaultySession::new());
    let missing = civic_core::model::ProposalId::generate();
    civic.session().reset_calls();

    assert!(civic.proposals().upvote(missing).expect_err("missing").is_not_found());
    assert!(civic.proposals().delete(missing).expect_err("missing").is_not_found());
    assert!(civic.session().writes().is_empty());
}

#[test]
fn update_writes_views_in_declared_order() {
    let civic = Civic::new(FaultySession::new());
    let p = civic.proposals().create("t", "b", author()).expect("create");
    civic.session().reset_calls();

    civic.proposals().update(p.id, "t2", "b2").expect("update");
    assert_eq!(
        *civic.session().calls.borrow(),
        vec![
            ("select", PROPOSALS_BY_ID),
            ("update", PROPOSALS_BY_ID),
            ("update", PROPOSALS_BY_USER_ID),
            ("update", PROPOSALS_BY_CREATED_AT),
        ]
    );
}

#[test]
fn purge_continues_past_a_timeout() {
    let civic = Civic::new(FaultySession::new());
    let p = civic.proposals().create("t", "b", author()).expect("create");
    civic
        .comments()
        .create(p.id, "c", caller().user_ref())
        .expect("comment");
    civic
        .session()
        .fail("truncate", PROPOSALS_BY_USER_ID, Fault::NoResponse);

    let report = civic.proposals().delete_all().expect("purge tolerates timeout");
    assert_eq!(report.timed_out, vec![PROPOSALS_BY_USER_ID]);
    assert_eq!(
        report.cleared,
        vec![
            PROPOSALS_BY_ID,
            PROPOSALS_BY_CREATED_AT,
            COMMENTS_BY_PROPOSAL_AND_COMMENT_ID,
            COMMENTS_BY_PROPOSAL_ID,
        ]
    );
    assert_eq!(count_rows(civic.session(), PROPOSALS_BY_USER_ID), 1);
    assert_eq!(count_rows(civic.session(), PROPOSALS_BY_ID), 0);
    assert_eq!(count_rows(civic.session(), COMMENTS_BY_PROPOSAL_ID), 0);
}

#[test]
fn purge_stops_on_other_errors() {
    let civic = Civic::new(FaultySession::new());
    civic.proposals().create("t", "b", author()).expect("create");
    civic
        .session()
        .fail("truncate", PROPOSALS_BY_USER_ID, Fault::Engine);

    let err = civic.proposals().delete_all().expect_err("engine error aborts");
    assert!(matches!(err, CivicError::Store(StoreError::Engine { .. })));
    assert_eq!(count_rows(civic.session(), PROPOSALS_BY_ID), 0);
    assert_eq!(count_rows(civic.session(), PROPOSALS_BY_CREATED_AT), 1);
}

#[test]
fn timeouts_outside_purges_are_errors() {
    let civic = Civic::new(FaultySession::new());
    let p = civic.proposals().create("t", "b", author()).expect("create");
    civic
        .session()
        .fail("delete", PROPOSALS_BY_ID, Fault::NoResponse);

    let err = civic.proposals().delete(p.id).expect_err("timeout");
    assert!(matches!(err, CivicError::Store(StoreError::NoResponse { .. })));
    civic.session().heal();
    assert_eq!(civic.proposals().get(p.id).expect("still there").id, p.id);
}

#[test]
fn failed_comment_purge_leaves_orphans_for_repair() {
    let civic = Civic::new(FaultySession::new());
    let p = civic.proposals().create("t", "b", author()).expect("create");
    civic
        .comments()
        .create(p.id, "c", caller().user_ref())
        .expect("comment");
    civic
        .session()
        .fail("delete", COMMENTS_BY_PROPOSAL_AND_COMMENT_ID, Fault::Engine);

    civic.proposals().delete(p.id).expect_err("comment purge fails");
    civic.session().heal();

    assert!(civic.proposals().get(p.id).expect_err("gone").is_not_found());
    let report = civic.verify().expect("verify");
    assert!(!report.is_consistent());

    let repaired = civic.repair().expect("repair");
    assert_eq!(repaired.orphan_comments_removed, 1);
    assert!(civic.verify().expect("verify").is_consistent());
}

//! Every view of an entity holds the same row after each logical operation.

use std::collections::BTreeMap;
use std::thread;

use civic_core::Civic;
use civic_core::db::schema::{
    COMMENTS_BY_PROPOSAL_AND_COMMENT_ID, COMMENTS_BY_PROPOSAL_ID, PROPOSALS_BY_CREATED_AT,
    PROPOSALS_BY_ID, PROPOSALS_BY_USER_ID,
};
use civic_core::db::{self, Row, Session, SqliteSession};
use civic_core::model::{Author, UserId, UserRef};
use civic_core::store::Replicated;
use rusqlite::types::Value;

const PROPOSAL_VIEWS: [&str; 3] = [PROPOSALS_BY_ID, PROPOSALS_BY_USER_ID, PROPOSALS_BY_CREATED_AT];
const COMMENT_VIEWS: [&str; 2] = [COMMENTS_BY_PROPOSAL_AND_COMMENT_ID, COMMENTS_BY_PROPOSAL_ID];

fn user(name: &str) -> Author {
    Author {
        user_id: UserId::from_uuid(uuid::Uuid::now_v7()),
        username: name.to_string(),
        first_name: format!("{name}-first"),
        last_name: format!("{name}-last"),
    }
}

fn commenter(name: &str) -> UserRef {
    user(name).user_ref()
}

/// Rows of `table` keyed by their `id` column.
fn rows_by_id(session: &SqliteSession, table: &'static str) -> BTreeMap<String, Row> {
    session
        .select(table, &[], None, None)
        .expect("select")
        .into_iter()
        .map(|row| {
            let Some(Value::Text(id)) = row.get("id").cloned() else {
                panic!("row in {table} without id: {row:?}");
            };
            (id, row)
        })
        .collect()
}

fn assert_views_agree(session: &SqliteSession, tables: &[&'static str]) -> usize {
    let canonical = rows_by_id(session, tables[0]);
    for table in &tables[1..] {
        assert_eq!(rows_by_id(session, table), canonical, "{table} diverges from {}", tables[0]);
    }
    canonical.len()
}

#[test]
fn views_agree_after_every_lifecycle_step() {
    let civic = Civic::new(db::open_in_memory().expect("store"));
    let session = civic.session();
    let proposals = civic.proposals();
    let comments = civic.comments();

    let a = proposals.create("Parks", "More trees", user("ada")).expect("a");
    let b = proposals.create("Buses", "Night routes", user("bob")).expect("b");
    assert_eq!(assert_views_agree(session, &PROPOSAL_VIEWS), 2);

    proposals.update(a.id, "Parks!", "Many more trees").expect("update");
    proposals.upvote(a.id).expect("upvote");
    proposals.downvote(b.id).expect("downvote");
    assert_views_agree(session, &PROPOSAL_VIEWS);

    let c1 = comments.create(a.id, "Yes", commenter("eve")).expect("c1");
    comments.create(a.id, "Agreed", commenter("dan")).expect("c2");
    comments.create(b.id, "Hmm", commenter("eve")).expect("c3");
    comments.update(c1.key(), "Yes please").expect("comment update");
    comments.upvote(c1.key()).expect("comment upvote");
    assert_eq!(assert_views_agree(session, &COMMENT_VIEWS), 3);
    assert_views_agree(session, &PROPOSAL_VIEWS);

    comments.delete(c1.key()).expect("comment delete");
    assert_eq!(assert_views_agree(session, &COMMENT_VIEWS), 2);
    assert_views_agree(session, &PROPOSAL_VIEWS);

    proposals.delete(a.id).expect("delete a");
    assert_eq!(assert_views_agree(session, &PROPOSAL_VIEWS), 1);
    assert_eq!(assert_views_agree(session, &COMMENT_VIEWS), 1);

    assert!(civic.verify().expect("verify").is_consistent());
}

#[test]
fn bike_lanes_scenario() {
    let civic = Civic::new(db::open_in_memory().expect("store"));
    let u = user("u");
    let p = civic
        .proposals()
        .create("Bike lanes", "Add protected lanes on Main St", u.clone())
        .expect("create");

    let fetched = civic.proposals().get(p.id).expect("get");
    assert_eq!(fetched.title, "Bike lanes");
    assert_eq!(fetched.text, "Add protected lanes on Main St");
    assert_eq!(fetched.author, u);
    assert_eq!(
        (fetched.upvotes, fetched.downvotes, fetched.comment_count),
        (0, 0, 0)
    );

    let c = civic
        .comments()
        .create(p.id, "Great idea", commenter("v"))
        .expect("comment");
    assert_eq!(civic.proposals().get(p.id).expect("get").comment_count, 1);

    civic.comments().delete(c.key()).expect("delete comment");
    assert_eq!(civic.proposals().get(p.id).expect("get").comment_count, 0);
}

#[test]
fn deleting_a_proposal_removes_its_comments_only() {
    let civic = Civic::new(db::open_in_memory().expect("store"));
    let keep = civic.proposals().create("keep", "b", user("a")).expect("keep");
    let drop = civic.proposals().create("drop", "b", user("a")).expect("drop");
    civic.comments().create(keep.id, "k", commenter("x")).expect("k");
    civic.comments().create(drop.id, "d1", commenter("x")).expect("d1");
    civic.comments().create(drop.id, "d2", commenter("y")).expect("d2");

    civic.proposals().delete(drop.id).expect("delete");

    assert!(civic.proposals().get(drop.id).expect_err("gone").is_not_found());
    assert!(civic.comments().list_by_proposal(drop.id).expect("list").is_empty());
    assert_eq!(civic.comments().list_by_proposal(keep.id).expect("list").len(), 1);
    assert_eq!(civic.proposals().get(keep.id).expect("get").comment_count, 1);
    assert!(civic.verify().expect("verify").is_consistent());
}

#[test]
fn sequential_upvotes_add_exactly() {
    let civic = Civic::new(db::open_in_memory().expect("store"));
    let p = civic.proposals().create("t", "b", user("a")).expect("create");
    civic.proposals().upvote(p.id).expect("first");
    civic.proposals().upvote(p.id).expect("second");
    assert_eq!(civic.proposals().get(p.id).expect("get").upvotes, 2);
}

#[test]
fn concurrent_upvotes_are_not_lost() {
    const PER_THREAD: u32 = 25;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("civic.db");

    let id = {
        let civic = Civic::new(db::open_store(&path, db::DEFAULT_BUSY_TIMEOUT).expect("open"));
        civic.proposals().create("t", "b", user("a")).expect("create").id
    };

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let civic =
                    Civic::new(db::open_store(&path, db::DEFAULT_BUSY_TIMEOUT).expect("open"));
                for _ in 0..PER_THREAD {
                    civic.proposals().upvote(id).expect("upvote");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    let civic = Civic::new(db::open_store(&path, db::DEFAULT_BUSY_TIMEOUT).expect("open"));
    assert_eq!(civic.proposals().get(id).expect("get").upvotes, 2 * PER_THREAD);
    assert!(civic.verify().expect("verify").is_consistent());
}

#[test]
fn comment_update_keeps_creation_time_and_parent() {
    let civic = Civic::new(db::open_in_memory().expect("store"));
    let p = civic.proposals().create("t", "b", user("a")).expect("create");
    let c = civic
        .comments()
        .create(p.id, "first", commenter("x"))
        .expect("comment");

    let updated = civic.comments().update(c.key(), "second").expect("update");
    assert_eq!(updated.created_at, c.created_at);
    assert_eq!(updated.proposal_id, p.id);
    assert_eq!(civic.comments().get(c.key()).expect("get"), updated);
}

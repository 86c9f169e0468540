//! Table layout for the proposal and comment view families.
//!
//! Every view is a `WITHOUT ROWID` table whose primary key spells out the
//! view's partition and clustering order, so rows are physically laid out
//! in the order the view is read. Views of one family share a column set.
//! No secondary indexes exist: each read pattern gets its own table.

pub const PROPOSALS_BY_ID: &str = "proposals_by_id";
pub const PROPOSALS_BY_USER_ID: &str = "proposals_by_user_id";
pub const PROPOSALS_BY_CREATED_AT: &str = "proposals_by_created_at";
pub const COMMENTS_BY_PROPOSAL_ID: &str = "comments_by_proposal_id";
pub const COMMENTS_BY_PROPOSAL_AND_COMMENT_ID: &str = "comments_by_proposal_and_comment_id";

/// Every view table, proposals first.
pub const VIEW_TABLES: [&str; 5] = [
    PROPOSALS_BY_ID,
    PROPOSALS_BY_USER_ID,
    PROPOSALS_BY_CREATED_AT,
    COMMENTS_BY_PROPOSAL_ID,
    COMMENTS_BY_PROPOSAL_AND_COMMENT_ID,
];

/// Migration v1: store metadata plus the proposal views.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_repair_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_repair_at_us) VALUES (1, 1, 0);

CREATE TABLE IF NOT EXISTS proposals_by_id (
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    proposal_text TEXT NOT NULL,
    user_id TEXT NOT NULL,
    username TEXT NOT NULL,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    no_of_comments INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    last_updated_us INTEGER NOT NULL,
    PRIMARY KEY (id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS proposals_by_user_id (
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    proposal_text TEXT NOT NULL,
    user_id TEXT NOT NULL,
    username TEXT NOT NULL,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    no_of_comments INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    last_updated_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, created_at_us, id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS proposals_by_created_at (
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    proposal_text TEXT NOT NULL,
    user_id TEXT NOT NULL,
    username TEXT NOT NULL,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    no_of_comments INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    last_updated_us INTEGER NOT NULL,
    PRIMARY KEY (created_at_us, id)
) WITHOUT ROWID;
";

/// Migration v2: the comment views.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS comments_by_proposal_id (
    proposal_id TEXT NOT NULL,
    id TEXT NOT NULL,
    comment TEXT NOT NULL,
    user_posted_id TEXT NOT NULL,
    user_posted_username TEXT NOT NULL,
    user_commented_id TEXT NOT NULL,
    user_commented_username TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    last_updated_us INTEGER NOT NULL,
    PRIMARY KEY (proposal_id, created_at_us, id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS comments_by_proposal_and_comment_id (
    proposal_id TEXT NOT NULL,
    id TEXT NOT NULL,
    comment TEXT NOT NULL,
    user_posted_id TEXT NOT NULL,
    user_posted_username TEXT NOT NULL,
    user_commented_id TEXT NOT NULL,
    user_commented_username TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    last_updated_us INTEGER NOT NULL,
    PRIMARY KEY (proposal_id, id)
) WITHOUT ROWID;
";

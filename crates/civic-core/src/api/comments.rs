use super::{Api, Caller, Reply, parse_body, require_caller, required, respond};
use crate::db::Session;
use crate::error::CivicError;
use crate::model::{CommentId, ProposalId};
use crate::store::comments::CommentKey;
use serde::{Deserialize, Serialize};

/// Body of `POST /proposal/comment/create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateCommentRequest {
    pub proposal_id: String,
    pub comment: String,
}

/// Body of `PUT /proposal/comment/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCommentRequest {
    pub proposal_id: String,
    pub comment_id: String,
    pub updated_comment: String,
}

fn comment_key(proposal_id: &str, comment_id: &str) -> Result<CommentKey, CivicError> {
    Ok(CommentKey {
        proposal_id: ProposalId::parse(proposal_id)?,
        comment_id: CommentId::parse(comment_id)?,
    })
}

/// Key from the `proposal-id` and `comment-id` query parameters.
fn query_key(
    proposal_id: Option<&str>,
    comment_id: Option<&str>,
) -> Result<CommentKey, CivicError> {
    comment_key(
        required(ProposalId::FIELD, proposal_id)?,
        required(CommentId::FIELD, comment_id)?,
    )
}

impl<S: Session> Api<'_, S> {
    /// `POST /proposal/comment/create`
    pub fn create_comment(&self, caller: Option<&Caller>, body: &str) -> Reply {
        respond(|| {
            let req: CreateCommentRequest = parse_body(body)?;
            let caller = require_caller(caller)?;
            let proposal_id = ProposalId::parse(&req.proposal_id)?;
            self.civic
                .comments()
                .create(proposal_id, &req.comment, caller.user_ref())?;
            Ok("commented")
        })
    }

    /// `GET /proposal/comment/getAll/:proposal-id`
    pub fn get_comments(&self, proposal_id: &str) -> Reply {
        respond(|| {
            let proposal_id = ProposalId::parse(proposal_id)?;
            self.civic.comments().list_by_proposal(proposal_id)
        })
    }

    /// `GET /proposal/comment/get?proposal-id=&comment-id=`
    pub fn get_comment(&self, proposal_id: Option<&str>, comment_id: Option<&str>) -> Reply {
        respond(|| {
            let key = query_key(proposal_id, comment_id)?;
            self.civic.comments().get(key)
        })
    }

    /// `PUT /proposal/comment/update`
    pub fn update_comment(&self, body: &str) -> Reply {
        respond(|| {
            let req: UpdateCommentRequest = parse_body(body)?;
            let key = comment_key(&req.proposal_id, &req.comment_id)?;
            self.civic.comments().update(key, &req.updated_comment)?;
            Ok("updated")
        })
    }

    /// `DELETE /proposal/comment/delete?proposal-id=&comment-id=`
    pub fn delete_comment(&self, proposal_id: Option<&str>, comment_id: Option<&str>) -> Reply {
        respond(|| {
            let key = query_key(proposal_id, comment_id)?;
            self.civic.comments().delete(key)?;
            Ok("deleted")
        })
    }

    /// `DELETE /proposal/comment/delete/:proposal-id`
    pub fn delete_proposal_comments(&self, proposal_id: &str) -> Reply {
        respond(|| {
            let proposal_id = ProposalId::parse(proposal_id)?;
            self.civic.comments().delete_all_for_proposal(proposal_id)?;
            Ok("deleted")
        })
    }

    /// `PUT /proposal/comment/upvote?proposal-id=&comment-id=`
    pub fn upvote_comment(&self, proposal_id: Option<&str>, comment_id: Option<&str>) -> Reply {
        respond(|| {
            let key = query_key(proposal_id, comment_id)?;
            self.civic.comments().upvote(key)?;
            Ok("upvoted")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, SqliteSession};
    use crate::model::{Comment, Proposal, UserId};
    use crate::service::Civic;

    fn caller(name: &str) -> Caller {
        Caller {
            user_id: UserId::from_uuid(uuid::Uuid::now_v7()),
            username: name.into(),
            first_name: "F".into(),
            last_name: "L".into(),
        }
    }

    fn with_proposal() -> (Civic<SqliteSession>, Proposal) {
        let civic = Civic::new(db::open_in_memory().expect("store"));
        let p = civic
            .proposals()
            .create("t", "b", caller("ada").author())
            .expect("proposal");
        (civic, p)
    }

    fn comments(api: &Api<'_, SqliteSession>, proposal_id: ProposalId) -> Vec<Comment> {
        let reply = api.get_comments(&proposal_id.to_string());
        serde_json::from_value(reply.envelope.data).expect("comments")
    }

    #[test]
    fn comment_lifecycle_through_the_api() {
        let (civic, p) = with_proposal();
        let api = Api::new(&civic);
        let pid = p.id.to_string();

        let body = format!(r#"{{"proposal_id":"{pid}","comment":"Great idea"}}"#);
        let reply = api.create_comment(Some(&caller("bob")), &body);
        assert_eq!(reply.envelope.data, serde_json::json!("commented"));

        let c = comments(&api, p.id).remove(0);
        let cid = c.comment_id.to_string();
        let shown = api.get_comment(Some(&pid), Some(&cid));
        let shown: Comment = serde_json::from_value(shown.envelope.data).expect("comment");
        assert_eq!(shown, c);

        let body = format!(
            r#"{{"proposal_id":"{pid}","comment_id":"{cid}","updated_comment":"Even better"}}"#
        );
        assert!(api.update_comment(&body).is_success());
        assert!(api.upvote_comment(Some(&pid), Some(&cid)).is_success());
        let c = comments(&api, p.id).remove(0);
        assert_eq!((c.text.as_str(), c.upvotes), ("Even better", 1));

        assert!(api.delete_comment(Some(&pid), Some(&cid)).is_success());
        assert!(comments(&api, p.id).is_empty());
        assert_eq!(civic.proposals().get(p.id).expect("get").comment_count, 0);
    }

    #[test]
    fn comment_create_needs_caller_and_text() {
        let (civic, p) = with_proposal();
        let api = Api::new(&civic);
        let body = format!(r#"{{"proposal_id":"{}","comment":""}}"#, p.id);
        assert_eq!(api.create_comment(None, &body).status, 401);
        assert_eq!(api.create_comment(Some(&caller("bob")), &body).status, 400);
    }

    #[test]
    fn query_ids_are_required_and_parsed() {
        let (civic, p) = with_proposal();
        let api = Api::new(&civic);
        let pid = p.id.to_string();
        assert_eq!(api.get_comment(Some(&pid), None).status, 400);
        assert_eq!(api.upvote_comment(None, Some(&pid)).status, 400);
        assert_eq!(api.delete_comment(Some(&pid), Some("bad")).status, 400);
        let unknown = CommentId::generate().to_string();
        let reply = api.get_comment(Some(&pid), Some(&unknown));
        assert_eq!(reply.status, 404);
    }

    #[test]
    fn delete_all_under_proposal_resets_count() {
        let (civic, p) = with_proposal();
        let api = Api::new(&civic);
        let body = format!(r#"{{"proposal_id":"{}","comment":"x"}}"#, p.id);
        api.create_comment(Some(&caller("bob")), &body);
        api.create_comment(Some(&caller("eve")), &body);
        assert_eq!(civic.proposals().get(p.id).expect("get").comment_count, 2);

        let reply = api.delete_proposal_comments(&p.id.to_string());
        assert_eq!(reply.envelope.data, serde_json::json!("deleted"));
        assert_eq!(civic.proposals().get(p.id).expect("get").comment_count, 0);
    }
}

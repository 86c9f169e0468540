use super::{Api, Caller, Reply, parse_body, parse_time_bound, require_caller, required, respond};
use crate::db::Session;
use crate::model::{ProposalId, UserId};
use serde::{Deserialize, Serialize};

/// Body of `POST /proposal/create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateProposalRequest {
    pub title: String,
    pub proposal_text: String,
}

/// Body of `PUT /proposal/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProposalRequest {
    pub id: String,
    pub title: String,
    pub proposal: String,
}

impl<S: Session> Api<'_, S> {
    /// `POST /proposal/create`
    pub fn create_proposal(&self, caller: Option<&Caller>, body: &str) -> Reply {
        respond(|| {
            let req: CreateProposalRequest = parse_body(body)?;
            let caller = require_caller(caller)?;
            self.civic
                .proposals()
                .create(&req.title, &req.proposal_text, caller.author())?;
            Ok("inserted proposal")
        })
    }

    /// `GET /proposal/getAll`
    pub fn get_all_proposals(&self) -> Reply {
        Reply::from_result(self.civic.proposals().list_all())
    }

    /// `GET /proposal/get/:id`, answered as a one-element array.
    pub fn get_proposal(&self, id: &str) -> Reply {
        respond(|| {
            let id = ProposalId::parse(id)?;
            Ok(vec![self.civic.proposals().get(id)?])
        })
    }

    /// `GET /proposal/get/user-id/:id`
    pub fn get_proposals_by_user(&self, user_id: &str) -> Reply {
        respond(|| {
            let user_id = UserId::parse(user_id)?;
            self.civic.proposals().list_by_author(user_id)
        })
    }

    /// `GET /proposal/get/time?date-from=&date-to=`
    pub fn get_proposals_by_time(&self, date_from: Option<&str>, date_to: Option<&str>) -> Reply {
        respond(|| {
            let from = parse_time_bound("date-from", required("date-from", date_from)?)?;
            let to = parse_time_bound("date-to", required("date-to", date_to)?)?;
            self.civic.proposals().list_by_time_range(from, to)
        })
    }

    /// `PUT /proposal/update`
    pub fn update_proposal(&self, body: &str) -> Reply {
        respond(|| {
            let req: UpdateProposalRequest = parse_body(body)?;
            let id = ProposalId::parse(&req.id)?;
            self.civic.proposals().update(id, &req.title, &req.proposal)?;
            Ok("updated")
        })
    }

    /// `DELETE /proposal/delete/:id`
    pub fn delete_proposal(&self, id: &str) -> Reply {
        respond(|| {
            let id = ProposalId::parse(id)?;
            self.civic.proposals().delete(id)?;
            Ok("deleted")
        })
    }

    /// `DELETE /proposal/deleteAll`
    pub fn delete_all_proposals(&self) -> Reply {
        respond(|| {
            self.civic.proposals().delete_all()?;
            Ok("deleted all proposals")
        })
    }

    /// `PUT /proposal/upvote/:id`
    pub fn upvote_proposal(&self, id: &str) -> Reply {
        respond(|| {
            self.civic.proposals().upvote(ProposalId::parse(id)?)?;
            Ok("upvoted")
        })
    }

    /// `PUT /proposal/downvote/:id`
    pub fn downvote_proposal(&self, id: &str) -> Reply {
        respond(|| {
            self.civic.proposals().downvote(ProposalId::parse(id)?)?;
            Ok("downvoted")
        })
    }
}

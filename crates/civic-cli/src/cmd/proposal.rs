//! `civic proposal ...`: the proposal endpoints.

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_reply, write_ack};
use anyhow::Result;
use civic_core::api::{Api, CreateProposalRequest, UpdateProposalRequest};
use civic_core::model::Proposal;
use clap::Subcommand;
use std::io::{self, Write};

#[derive(Subcommand, Debug)]
pub enum ProposalCommand {
    #[command(
        about = "Create a proposal as the configured identity",
        after_help = "EXAMPLES:\n    civic --user-id <uuid> --username ada proposal create --title \"Bike lanes\" --text \"Protected lanes on Main St\""
    )]
    Create {
        #[arg(long)]
        title: String,
        /// Proposal body.
        #[arg(long)]
        text: String,
    },

    #[command(about = "List every proposal, newest first")]
    List,

    #[command(about = "Show one proposal")]
    Show { id: String },

    #[command(about = "List proposals by one author, newest first")]
    ByUser { user_id: String },

    #[command(
        about = "List proposals created within a time range",
        after_help = "Bounds use the YYYY-MM-DD-HH:MM form and are inclusive.\n\nEXAMPLES:\n    civic proposal by-time --from 2024-01-01-00:00 --to 2024-01-31-23:59"
    )]
    ByTime {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    #[command(about = "Replace a proposal's title and text")]
    Update {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
    },

    #[command(about = "Delete a proposal and its comments")]
    Delete { id: String },

    #[command(about = "Delete every proposal and comment")]
    DeleteAll {
        /// Required; there is no undo.
        #[arg(long)]
        yes: bool,
    },

    #[command(about = "Add one upvote")]
    Upvote { id: String },

    #[command(about = "Add one downvote")]
    Downvote { id: String },
}

/// Execute one proposal subcommand.
///
/// # Errors
///
/// Returns an error when the store cannot be opened, the identity is
/// malformed, or the request layer answers with a failure.
pub fn run(command: &ProposalCommand, ctx: &Context) -> Result<()> {
    let civic = ctx.open()?;
    let api = Api::new(&civic);
    let mode = ctx.output;

    match command {
        ProposalCommand::Create { title, text } => {
            let caller = ctx.caller()?;
            let body = serde_json::to_string(&CreateProposalRequest {
                title: title.clone(),
                proposal_text: text.clone(),
            })?;
            render_reply(mode, &api.create_proposal(caller.as_ref(), &body), write_ack)
        }
        ProposalCommand::List => render_reply(mode, &api.get_all_proposals(), |data, w| {
            write_proposals(mode, data, w)
        }),
        ProposalCommand::Show { id } => render_reply(mode, &api.get_proposal(id), |data, w| {
            write_proposals(mode, data, w)
        }),
        ProposalCommand::ByUser { user_id } => {
            render_reply(mode, &api.get_proposals_by_user(user_id), |data, w| {
                write_proposals(mode, data, w)
            })
        }
        ProposalCommand::ByTime { from, to } => {
            let reply = api.get_proposals_by_time(from.as_deref(), to.as_deref());
            render_reply(mode, &reply, |data, w| write_proposals(mode, data, w))
        }
        ProposalCommand::Update { id, title, text } => {
            let body = serde_json::to_string(&UpdateProposalRequest {
                id: id.clone(),
                title: title.clone(),
                proposal: text.clone(),
            })?;
            render_reply(mode, &api.update_proposal(&body), write_ack)
        }
        ProposalCommand::Delete { id } => render_reply(mode, &api.delete_proposal(id), write_ack),
        ProposalCommand::DeleteAll { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete every proposal without --yes");
            }
            render_reply(mode, &api.delete_all_proposals(), write_ack)
        }
        ProposalCommand::Upvote { id } => render_reply(mode, &api.upvote_proposal(id), write_ack),
        ProposalCommand::Downvote { id } => {
            render_reply(mode, &api.downvote_proposal(id), write_ack)
        }
    }
}

fn write_proposals(
    mode: OutputMode,
    data: &serde_json::Value,
    w: &mut dyn Write,
) -> io::Result<()> {
    let proposals: Vec<Proposal> = serde_json::from_value(data.clone()).map_err(io::Error::other)?;
    if mode == OutputMode::Pretty {
        if proposals.is_empty() {
            return writeln!(w, "No proposals.");
        }
        for proposal in &proposals {
            write_pretty(proposal, w)?;
        }
        return Ok(());
    }

    if !proposals.is_empty() {
        writeln!(w, "id  votes  comments  created  author  title")?;
    }
    for p in &proposals {
        writeln!(
            w,
            "{}  +{}/-{}  {}  {}  {}  {}",
            p.id,
            p.upvotes,
            p.downvotes,
            p.comment_count,
            p.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            p.author.username,
            p.title
        )?;
    }
    Ok(())
}

fn write_pretty(p: &Proposal, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &p.title)?;
    pretty_kv(w, "id", p.id.to_string())?;
    pretty_kv(
        w,
        "author",
        format!(
            "{} ({} {})",
            p.author.username, p.author.first_name, p.author.last_name
        ),
    )?;
    pretty_kv(w, "votes", format!("+{} / -{}", p.upvotes, p.downvotes))?;
    pretty_kv(w, "comments", p.comment_count.to_string())?;
    pretty_kv(w, "created", p.created_at.to_rfc3339())?;
    if p.last_updated != p.created_at {
        pretty_kv(w, "updated", p.last_updated.to_rfc3339())?;
    }
    writeln!(w)?;
    for line in p.text.lines() {
        writeln!(w, "  {line}")?;
    }
    writeln!(w)
}

//! `civic comment ...`: the comment endpoints.

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_reply, write_ack};
use anyhow::Result;
use civic_core::api::{Api, CreateCommentRequest, UpdateCommentRequest};
use civic_core::model::Comment;
use clap::Subcommand;
use std::io::{self, Write};

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    #[command(
        about = "Comment on a proposal as the configured identity",
        after_help = "EXAMPLES:\n    civic --user-id <uuid> --username bob comment create <proposal-id> --text \"Great idea\""
    )]
    Create {
        proposal_id: String,
        #[arg(long)]
        text: String,
    },

    #[command(about = "List a proposal's comments, newest first")]
    List { proposal_id: String },

    #[command(about = "Show one comment")]
    Show {
        proposal_id: String,
        comment_id: String,
    },

    #[command(about = "Replace a comment's text")]
    Update {
        proposal_id: String,
        comment_id: String,
        #[arg(long)]
        text: String,
    },

    #[command(about = "Delete one comment")]
    Delete {
        proposal_id: String,
        comment_id: String,
    },

    #[command(about = "Delete every comment under a proposal")]
    DeleteAll { proposal_id: String },

    #[command(about = "Add one upvote")]
    Upvote {
        proposal_id: String,
        comment_id: String,
    },
}

/// Execute one comment subcommand.
///
/// # Errors
///
/// Returns an error when the store cannot be opened, the identity is
/// malformed, or the request layer answers with a failure.
pub fn run(command: &CommentCommand, ctx: &Context) -> Result<()> {
    let civic = ctx.open()?;
    let api = Api::new(&civic);
    let mode = ctx.output;

    match command {
        CommentCommand::Create { proposal_id, text } => {
            let caller = ctx.caller()?;
            let body = serde_json::to_string(&CreateCommentRequest {
                proposal_id: proposal_id.clone(),
                comment: text.clone(),
            })?;
            render_reply(mode, &api.create_comment(caller.as_ref(), &body), write_ack)
        }
        CommentCommand::List { proposal_id } => {
            render_reply(mode, &api.get_comments(proposal_id), |data, w| {
                write_comments(mode, data, w)
            })
        }
        CommentCommand::Show {
            proposal_id,
            comment_id,
        } => {
            let reply = api.get_comment(Some(proposal_id.as_str()), Some(comment_id.as_str()));
            render_reply(mode, &reply, |data, w| write_comment(mode, data, w))
        }
        CommentCommand::Update {
            proposal_id,
            comment_id,
            text,
        } => {
            let body = serde_json::to_string(&UpdateCommentRequest {
                proposal_id: proposal_id.clone(),
                comment_id: comment_id.clone(),
                updated_comment: text.clone(),
            })?;
            render_reply(mode, &api.update_comment(&body), write_ack)
        }
        CommentCommand::Delete {
            proposal_id,
            comment_id,
        } => render_reply(
            mode,
            &api.delete_comment(Some(proposal_id.as_str()), Some(comment_id.as_str())),
            write_ack,
        ),
        CommentCommand::DeleteAll { proposal_id } => {
            render_reply(mode, &api.delete_proposal_comments(proposal_id), write_ack)
        }
        CommentCommand::Upvote {
            proposal_id,
            comment_id,
        } => render_reply(
            mode,
            &api.upvote_comment(Some(proposal_id.as_str()), Some(comment_id.as_str())),
            write_ack,
        ),
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: &serde_json::Value) -> io::Result<T> {
    serde_json::from_value(data.clone()).map_err(io::Error::other)
}

fn write_comments(mode: OutputMode, data: &serde_json::Value, w: &mut dyn Write) -> io::Result<()> {
    let comments: Vec<Comment> = decode(data)?;
    if mode == OutputMode::Pretty {
        if comments.is_empty() {
            return writeln!(w, "No comments.");
        }
        for comment in &comments {
            write_pretty(comment, w)?;
        }
        return Ok(());
    }

    if !comments.is_empty() {
        writeln!(w, "id  upvotes  created  commenter  comment")?;
    }
    for comment in &comments {
        write_row(comment, w)?;
    }
    Ok(())
}

fn write_comment(mode: OutputMode, data: &serde_json::Value, w: &mut dyn Write) -> io::Result<()> {
    let comment: Comment = decode(data)?;
    match mode {
        OutputMode::Pretty => write_pretty(&comment, w),
        _ => write_row(&comment, w),
    }
}

fn write_row(c: &Comment, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  {}  {}",
        c.comment_id,
        c.upvotes,
        c.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
        c.commenter_username,
        c.text
    )
}

fn write_pretty(c: &Comment, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} on {}", c.commenter_username, c.proposal_id))?;
    pretty_kv(w, "id", c.comment_id.to_string())?;
    pretty_kv(w, "proposal by", &c.posted_by_username)?;
    pretty_kv(w, "upvotes", c.upvotes.to_string())?;
    pretty_kv(w, "created", c.created_at.to_rfc3339())?;
    writeln!(w)?;
    for line in c.text.lines() {
        writeln!(w, "  {line}")?;
    }
    writeln!(w)
}

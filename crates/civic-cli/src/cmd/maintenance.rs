//! Store lifecycle: `civic init`, `civic verify`, `civic repair`.

use super::Context;
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use anyhow::{Context as _, Result};
use civic_core::consistency::{RepairReport, VerifyReport};
use civic_core::db::{self, migrations};
use civic_core::error::CivicError;
use civic_core::model;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct InitOutput {
    path: String,
    schema_version: u32,
}

/// Execute `civic init`: create or migrate the store and report its version.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or migrated.
pub fn run_init(ctx: &Context) -> Result<()> {
    let civic = ctx.open()?;
    let schema_version = migrations::current_schema_version(civic.session().connection())
        .context("read schema version")?;
    let out = InitOutput {
        path: ctx.config.store_path.display().to_string(),
        schema_version,
    };

    render_mode(
        ctx.output,
        &out,
        |o, w| writeln!(w, "{}  schema v{}", o.path, o.schema_version),
        |o, w| {
            writeln!(w, "✓ Store ready.")?;
            writeln!(w)?;
            pretty_kv(w, "path", &o.path)?;
            pretty_kv(w, "schema", format!("v{}", o.schema_version))
        },
    )
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
    #[serde(flatten)]
    report: VerifyReport,
    consistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_repair_at: Option<String>,
}

/// Execute `civic verify`.
///
/// # Errors
///
/// Returns an error when the scan fails or when any divergence is found,
/// so scripts can gate on the exit status.
pub fn run_verify(ctx: &Context) -> Result<()> {
    let civic = ctx.open()?;
    let report = civic.verify().map_err(|err| store_failure(ctx.output, &err))?;
    let last_repair_at = db::last_repair_at(civic.session())?.map(|at| at.to_rfc3339());
    let out = VerifyOutput {
        consistent: report.is_consistent(),
        report,
        last_repair_at,
    };

    render_mode(
        ctx.output,
        &out,
        |o, w| {
            for divergence in &o.report.divergences {
                writeln!(w, "{divergence}")?;
            }
            writeln!(
                w,
                "{} proposals  {} comments  {} divergences",
                o.report.proposals,
                o.report.comments,
                o.report.divergences.len()
            )
        },
        |o, w| {
            pretty_section(w, "View consistency")?;
            pretty_kv(w, "proposals", o.report.proposals.to_string())?;
            pretty_kv(w, "comments", o.report.comments.to_string())?;
            if let Some(at) = &o.last_repair_at {
                pretty_kv(w, "repaired", at)?;
            }
            writeln!(w)?;
            if o.consistent {
                return writeln!(w, "✓ All views agree.");
            }
            for divergence in &o.report.divergences {
                writeln!(w, "  ✗ {divergence}")?;
            }
            writeln!(w)?;
            writeln!(w, "Run `civic repair` to re-derive the views.")
        },
    )?;

    if !out.consistent {
        anyhow::bail!("{} divergences found", out.report.divergences.len());
    }
    Ok(())
}

/// Execute `civic repair`.
///
/// # Errors
///
/// Returns an error when a store operation fails part way; rerunning
/// continues from where it stopped.
pub fn run_repair(ctx: &Context) -> Result<()> {
    let civic = ctx.open()?;
    let report = civic.repair().map_err(|err| store_failure(ctx.output, &err))?;
    db::record_repair(civic.session(), model::now())?;

    render_mode(
        ctx.output,
        &report,
        |r, w| {
            writeln!(
                w,
                "rewritten {}  removed {}  orphan_comments {}  counts {}",
                r.rows_rewritten, r.rows_removed, r.orphan_comments_removed, r.counts_corrected
            )
        },
        |r: &RepairReport, w| {
            if r.is_noop() {
                return writeln!(w, "✓ Nothing to repair.");
            }
            pretty_section(w, "Repair")?;
            pretty_kv(w, "rewritten", r.rows_rewritten.to_string())?;
            pretty_kv(w, "removed", r.rows_removed.to_string())?;
            pretty_kv(w, "orphans", r.orphan_comments_removed.to_string())?;
            pretty_kv(w, "counts", r.counts_corrected.to_string())
        },
    )
}

fn store_failure(mode: OutputMode, err: &CivicError) -> anyhow::Error {
    let code = err.code();
    if let Err(render) = render_error(mode, &CliError::from_code(code, code.message())) {
        tracing::warn!(error = %render, "failed to render error");
    }
    anyhow::anyhow!("[{code}] {err}")
}

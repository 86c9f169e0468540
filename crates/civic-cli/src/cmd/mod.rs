pub mod comment;
pub mod completions;
pub mod maintenance;
pub mod proposal;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Result;
use civic_core::Civic;
use civic_core::api::Caller;
use civic_core::config::EffectiveConfig;
use civic_core::db::{self, SqliteSession};
use civic_core::error::ErrorCode;

/// Everything a command handler needs from the resolved configuration.
pub struct Context {
    pub config: EffectiveConfig,
    pub output: OutputMode,
}

impl Context {
    pub fn new(config: EffectiveConfig) -> Self {
        let output = OutputMode::from_resolved(&config.resolved_output);
        Self { config, output }
    }

    /// Open the configured store, migrating it if needed.
    pub fn open(&self) -> Result<Civic<SqliteSession>> {
        let path = &self.config.store_path;
        match db::open_store(path, self.config.busy_timeout) {
            Ok(session) => Ok(Civic::new(session)),
            Err(err) => {
                render_error(
                    self.output,
                    &CliError::from_code(
                        ErrorCode::StoreUnavailable,
                        format!("cannot open store at {}: {err:#}", path.display()),
                    ),
                )?;
                Err(err)
            }
        }
    }

    /// The configured identity, if one is set.
    ///
    /// An absent identity is not an error here; endpoints that need one
    /// answer with their own unauthenticated reply.
    pub fn caller(&self) -> Result<Option<Caller>> {
        match self.config.identity.caller() {
            Ok(caller) => Ok(caller),
            Err(err) => {
                render_error(
                    self.output,
                    &CliError::from_code(ErrorCode::Unauthenticated, format!("{err:#}")),
                )?;
                Err(err)
            }
        }
    }
}

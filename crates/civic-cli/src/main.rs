#![forbid(unsafe_code)]

mod cmd;
mod output;

use civic_core::config::{self, IdentityConfig, Overrides};
use civic_core::error::ErrorCode;
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "civic: proposals and comments over a denormalized view store",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Store file (overrides config).
    #[arg(long, global = true, env = "CIVIC_DB")]
    db: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
    json: bool,

    /// Acting user id (canonical UUID).
    #[arg(long, global = true, env = "CIVIC_USER_ID")]
    user_id: Option<String>,

    #[arg(long, global = true, env = "CIVIC_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "CIVIC_FIRSTNAME")]
    firstname: Option<String>,

    #[arg(long, global = true, env = "CIVIC_LASTNAME")]
    lastname: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            db: self.db.clone(),
            identity: IdentityConfig {
                user_id: self.user_id.clone(),
                username: self.username.clone(),
                firstname: self.firstname.clone(),
                lastname: self.lastname.clone(),
            },
            json: self.json,
            format: self.format.map(|mode| mode.as_str().to_string()),
        }
    }

    /// Output mode before any config file has been read.
    fn flag_output(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            self.format.unwrap_or(OutputMode::Text)
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Store",
        about = "Create or migrate the store",
        after_help = "EXAMPLES:\n    civic init\n    civic --db ./civic.db init --json"
    )]
    Init,

    #[command(next_help_heading = "Proposals", about = "Work with proposals")]
    Proposal {
        #[command(subcommand)]
        command: cmd::proposal::ProposalCommand,
    },

    #[command(next_help_heading = "Comments", about = "Work with comments")]
    Comment {
        #[command(subcommand)]
        command: cmd::comment::CommentCommand,
    },

    #[command(
        next_help_heading = "Store",
        about = "Check that every view agrees with its canonical view",
        long_about = "Compare every view against its canonical view and check comment counts. Exits non-zero when anything diverges.",
        after_help = "EXAMPLES:\n    civic verify\n    civic verify --json"
    )]
    Verify,

    #[command(
        next_help_heading = "Store",
        about = "Re-derive views and comment counts from the canonical views",
        after_help = "EXAMPLES:\n    civic repair"
    )]
    Repair,

    #[command(
        next_help_heading = "Store",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    civic completions bash\n    civic completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CIVIC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "civic=debug,info"
        } else {
            "civic=info,warn"
        })
    });

    let format = env::var("CIVIC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = env::current_dir()?;
    let config = match config::resolve_config(&project_root, cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            render_error(
                cli.flag_output(),
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let ctx = cmd::Context::new(config);
    debug!(
        store = %ctx.config.store_path.display(),
        output = ctx.output.as_str(),
        "configuration resolved"
    );

    match &cli.command {
        Commands::Init => cmd::maintenance::run_init(&ctx),
        Commands::Proposal { command } => cmd::proposal::run(command, &ctx),
        Commands::Comment { command } => cmd::comment::run(command, &ctx),
        Commands::Verify => cmd::maintenance::run_verify(&ctx),
        Commands::Repair => cmd::maintenance::run_repair(&ctx),
        Commands::Completions(_) => Ok(()),
    }
}

mod args;
mod commands;
mod data;
mod render;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bizflow_model::{OwnerId, RecordKind};
use bizflow_view::Config;

use crate::args::{QueryArgs, SortArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Which board a `board` subcommand works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Pipeline {
    Leads,
    Tasks,
}

/// Small-business CRM data toolkit.
#[derive(Parser)]
#[command(name = "bizflow", version, about = "Small-business CRM data toolkit")]
struct Cli {
    /// Path to the JSON data file
    #[arg(long, global = true, default_value = "bizflow.json")]
    data: PathBuf,

    /// Path to the TOML config file (default: ./bizflow.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Owner whose records are shown and edited
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show one page of records matching a query
    Query {
        /// customers, leads, tasks or notes
        kind: RecordKind,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        sort: SortArgs,
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Records per page (overrides the config file)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Export every record matching a query as CSV
    Export {
        /// customers, leads, tasks or notes
        kind: RecordKind,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        sort: SortArgs,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import customers from a CSV file with name, email and tags columns
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Parse and report without creating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Pipeline and kanban boards
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Customer tag vocabulary and bulk tag edits
    Tags {
        #[command(subcommand)]
        command: TagsCommands,
    },

    /// Saved customer segments
    Segments {
        #[command(subcommand)]
        command: SegmentsCommands,
    },

    /// Notes on one customer
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum BoardCommands {
    /// Print every stage column
    Show {
        pipeline: Pipeline,
        /// Only tasks of this project
        #[arg(long)]
        project: Option<String>,
    },
    /// Move a record between stages
    Move {
        pipeline: Pipeline,
        id: String,
        from: String,
        to: String,
    },
    /// Delete every record in one stage
    Clear { pipeline: Pipeline, stage: String },
}

#[derive(Subcommand)]
pub(crate) enum TagsCommands {
    /// List every tag with the number of customers carrying it
    List,
    /// Add tags to the given customers
    Add {
        /// Customer id (repeatable)
        #[arg(long = "id", required = true)]
        ids: Vec<String>,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from the given customers
    Remove {
        /// Customer id (repeatable)
        #[arg(long = "id", required = true)]
        ids: Vec<String>,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Rename a tag on every customer
    Rename { from: String, to: String },
    /// Remove a tag from every customer
    Delete { tag: String },
}

#[derive(Subcommand)]
pub(crate) enum SegmentsCommands {
    /// List saved segments with their current match counts
    List,
    /// Save the given filters as a named segment
    Save {
        name: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Rename a saved segment
    Rename { id: String, name: String },
    /// Delete a saved segment
    Delete { id: String },
}

#[derive(Subcommand)]
pub(crate) enum NotesCommands {
    /// Print a customer's notes, newest first
    List { customer: String },
    /// Add a note to a customer
    Add { customer: String, content: String },
    /// Delete one of a customer's notes
    Delete { customer: String, id: String },
}

/// Everything a command needs besides its own arguments.
pub(crate) struct Context {
    pub data: PathBuf,
    pub config: Config,
    pub owner: Option<OwnerId>,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    pub fn owner(&self) -> Result<OwnerId, String> {
        self.owner
            .clone()
            .ok_or_else(|| "no owner given; pass --owner".to_string())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BIZFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match data::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&format!("error: {}", msg), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let ctx = Context {
        data: cli.data,
        config,
        owner: cli.owner.map(OwnerId::new),
        output: cli.output,
        quiet: cli.quiet,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: failed to start runtime: {}", e), ctx.output, ctx.quiet);
            process::exit(1);
        }
    };
    if let Err(msg) = runtime.block_on(commands::run(cli.command, &ctx)) {
        report_error(&format!("error: {}", msg), ctx.output, ctx.quiet);
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("serialization error: {}", e))?;
    println!("{}", text);
    Ok(())
}

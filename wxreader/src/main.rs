//! wxreader - read-only JSON CLI over decrypted chat storage
//!
//! Every subcommand prints one JSON document to stdout. Logs never go to
//! stdout: they are written to the XDG state dir, or to stderr with `-v`.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/wxreader/wxreader.log (~/.local/state/wxreader/wxreader.log)
//! - Config: $XDG_CONFIG_HOME/wxreader/config.toml (~/.config/wxreader/config.toml)

mod since;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use wxreader_core::logging::{self, LogTarget};
use wxreader_core::{Config, MessageQuery, Reader};

#[derive(Parser)]
#[command(name = "wxreader")]
#[command(about = "Read contacts, groups and messages from decrypted chat storage")]
#[command(version)]
struct Args {
    /// Config file (defaults to $XDG_CONFIG_HOME/wxreader/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr instead of the log file (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the storage root and report what was found
    Init {
        /// Storage root (defaults to storage.root from config)
        root: Option<PathBuf>,
    },
    /// List individual contacts
    Contacts {
        /// Storage root (defaults to storage.root from config)
        root: Option<PathBuf>,
    },
    /// List group chats
    Groups {
        /// Storage root (defaults to storage.root from config)
        root: Option<PathBuf>,
    },
    /// List one conversation's messages, oldest first
    Messages {
        /// Storage root
        root: PathBuf,
        /// Conversation identifier (contact wxid or `...@chatroom`)
        chat: String,
        /// Maximum rows per shard
        #[arg(default_value_t = 100)]
        limit: u32,
        /// Rows to skip per shard
        #[arg(default_value_t = 0)]
        offset: u32,
        /// Only messages at or after this time (epoch seconds, RFC 3339 or YYYY-MM-DD)
        #[arg(value_parser = since::parse_since)]
        since: Option<i64>,
    },
    /// Report storage status
    Status {
        /// Storage root (defaults to storage.root from config)
        root: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                print_error(e.to_string().trim_end(), false);
                return ExitCode::FAILURE;
            }
        },
    };
    let pretty = args.pretty;

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{e:#}"), pretty);
            ExitCode::FAILURE
        }
    }
}

fn print_error(message: &str, pretty: bool) {
    let output = ErrorOutput {
        error: message.to_string(),
    };
    if let Ok(json) = render(&output, pretty) {
        println!("{json}");
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let target = if args.verbose > 0 {
        config.logging.level = match args.verbose {
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string();
        LogTarget::Stderr
    } else {
        LogTarget::File
    };
    let _log_guard =
        logging::init(&config.logging, target).context("failed to initialize logging")?;

    tracing::info!("wxreader starting");

    // Logged here so the record is flushed before the guard drops.
    let result = dispatch(args.command, &config, args.pretty);
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "wxreader failed");
    }
    result
}

fn dispatch(command: Command, config: &Config, pretty: bool) -> Result<()> {
    let reader = Reader::from_config(config);
    let resolve = |root: Option<PathBuf>| -> Result<PathBuf> {
        root.or_else(|| config.storage.root.clone())
            .context("no storage root given and storage.root is not configured")
    };

    let json = match command {
        Command::Init { root } => render(&reader.init(&resolve(root)?), pretty)?,
        Command::Contacts { root } => render(&reader.list_contacts(&resolve(root)?), pretty)?,
        Command::Groups { root } => render(&reader.list_groups(&resolve(root)?), pretty)?,
        Command::Messages {
            root,
            chat,
            limit,
            offset,
            since,
        } => {
            let query = MessageQuery {
                limit,
                offset,
                since: since.unwrap_or(0),
            };
            render(&reader.get_messages(&root, &chat, &query), pretty)?
        }
        Command::Status { root } => render(&reader.status(&resolve(root)?), pretty)?,
    };

    println!("{json}");
    Ok(())
}

fn render<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

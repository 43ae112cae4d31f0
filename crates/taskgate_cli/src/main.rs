//! Command-line front end for `taskgate_core`.
//!
//! # Responsibility
//! - Map subcommands onto `TaskGate` routes against a local SQLite file.
//! - Print JSON on stdout; print the outward error body on stderr.
//!
//! Passwords are read from stdin so they never appear in argv or shell history.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use taskgate_core::{
    default_log_level, init_logging, AuthConfig, AuthError, SqliteTaskGate as App, TaskDraft,
};

#[derive(Parser)]
#[command(name = "taskgate")]
#[command(about = "Authenticated, ownership-scoped task store", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "taskgate.sqlite3")]
    db: PathBuf,

    /// Write rolling logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a principal; the password is read from stdin
    Register { username: String },

    /// Log in and print a session token; the password is read from stdin
    Login { username: String },

    /// Grant the admin role to a principal (admin only)
    Promote {
        /// Hex id of the principal to promote
        user_id: String,

        #[arg(long, env = "TASKGATE_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Manage your own tasks
    Tasks {
        #[arg(long, env = "TASKGATE_TOKEN", hide_env_values = true, global = true)]
        token: Option<String>,

        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    List,
    Get {
        id: String,
    },
    Create {
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Replace the fields of an existing task
    Update {
        id: String,
        #[command(flatten)]
        fields: TaskFields,
    },
    Delete {
        id: String,
    },
}

#[derive(clap::Args)]
struct TaskFields {
    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Due date as unix epoch milliseconds
    #[arg(long)]
    due_at_ms: Option<i64>,

    #[arg(long, default_value = "todo")]
    status: String,
}

impl From<TaskFields> for TaskDraft {
    fn from(fields: TaskFields) -> Self {
        TaskDraft {
            title: fields.title,
            description: fields.description,
            due_at_ms: fields.due_at_ms,
            status: fields.status,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AuthError>() {
                Some(auth_err) => match serde_json::to_string(&auth_err.body()) {
                    Ok(body) => eprintln!("{body}"),
                    Err(_) => eprintln!("{auth_err}"),
                },
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(log_dir) = &cli.log_dir {
        start_logging(log_dir, cli.log_level.as_deref())?;
    }

    let config = AuthConfig::from_env().context("loading configuration")?;
    let app = App::open_sqlite(&config, &cli.db)
        .with_context(|| format!("opening database `{}`", cli.db.display()))?;

    match cli.command {
        Commands::Register { username } => {
            let password = read_password()?;
            print_json(&app.register(&username, &password)?)
        }
        Commands::Login { username } => {
            let password = read_password()?;
            let issued = app.login(&username, &password)?;
            print_json(&serde_json::json!({
                "token": issued.token,
                "expires_at": issued.expires_at,
            }))
        }
        Commands::Promote { user_id, token } => {
            let header = bearer(&token);
            print_json(&app.promote(Some(&header), &user_id)?)
        }
        Commands::Tasks { token, command } => run_tasks(&app, token.as_deref(), command),
    }
}

fn run_tasks(app: &App, token: Option<&str>, command: TaskCommands) -> Result<()> {
    let header = token.map(bearer);
    let header = header.as_deref();

    match command {
        TaskCommands::List => print_json(&app.list_tasks(header)?),
        TaskCommands::Get { id } => print_json(&app.get_task(header, &id)?),
        TaskCommands::Create { fields } => print_json(&app.create_task(header, fields.into())?),
        TaskCommands::Update { id, fields } => {
            print_json(&app.update_task(header, &id, fields.into())?)
        }
        TaskCommands::Delete { id } => {
            app.delete_task(header, &id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn start_logging(log_dir: &std::path::Path, level: Option<&str>) -> Result<()> {
    let log_dir = std::path::absolute(log_dir)
        .with_context(|| format!("resolving log directory `{}`", log_dir.display()))?;
    let Some(log_dir) = log_dir.to_str() else {
        bail!("log directory must be valid UTF-8");
    };
    init_logging(level.unwrap_or_else(|| default_log_level()), log_dir)?;
    Ok(())
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("expected a password on stdin");
    }
    Ok(password)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

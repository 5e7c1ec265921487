//! # Rollbook CLI Module
//!
//! This module implements the CLI interface for Rollbook.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database (and a roster template)
//! - `mark` - Mark one student for a class and date
//! - `submit` - Submit a class/date, marking the rest absent
//! - `unlock` - Reopen a submitted class/date
//! - `status` - Attendance status of a student on a date
//! - `history` - All records of a student
//! - `records` - Filtered attendance records
//! - `students` - Filtered roster students
//! - `summary` - Present/late/absent counts
//! - `export` - Export all records to a snapshot file
//! - `import` - Import records from a snapshot file

mod commands;

use crate::config::{BackendKind, Overrides, RollbookConfig, Settings};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rollbook_core::{Actor, ActorId, AttendanceStatus, Role, RollbookError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Rollbook - attendance tracking and submission
///
/// Role-gated daily attendance with an audit trail and roster-reconciling
/// submission.
#[derive(Parser, Debug)]
#[command(name = "rollbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short = 'c', long, global = true, default_value = "rollbook.toml")]
    pub config: PathBuf,

    /// Path to the attendance database (overrides [storage] path)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "file" (snapshot file)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<BackendKind>,

    /// Path to the roster file (overrides [roster] path)
    #[arg(short = 'R', long, global = true)]
    pub roster: Option<PathBuf>,

    /// Pin "today" to this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub today: Option<NaiveDate>,

    /// Identifier of the acting user
    #[arg(short = 'a', long, global = true)]
    pub actor: Option<String>,

    /// Role of the acting user (admin, accounts, teacher, student, parent)
    #[arg(short = 'r', long, global = true)]
    pub role: Option<Role>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides [server] host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Mark one student
    Mark {
        /// Class id
        #[arg(short = 'C', long)]
        class: String,

        /// Student id
        #[arg(short = 'S', long)]
        student: String,

        /// Present, Late or Absent
        #[arg(short = 't', long)]
        status: AttendanceStatus,

        /// Date (default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Optional free-text remark
        #[arg(short = 'm', long)]
        remark: Option<String>,
    },

    /// Submit a class for a date; unmarked students become absent
    Submit {
        #[arg(short = 'C', long)]
        class: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Reopen a submitted class/date (admin/accounts)
    Unlock {
        #[arg(short = 'C', long)]
        class: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show a student's status on a date
    Status {
        #[arg(short = 'S', long)]
        student: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show a student's attendance history
    History {
        #[arg(short = 'S', long)]
        student: String,
    },

    /// List attendance records
    Records {
        /// Class id or "all"
        #[arg(short = 'C', long, default_value = "all")]
        class: String,

        /// Student id or "all"
        #[arg(short = 'S', long, default_value = "all")]
        student: String,

        /// Only this date
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List roster students visible to the actor
    Students {
        #[arg(short = 'C', long, default_value = "all")]
        class: String,

        #[arg(short = 'S', long, default_value = "all")]
        student: String,

        /// Case-insensitive name or id search
        #[arg(short = 's', long, default_value = "")]
        search: String,
    },

    /// Count present, late and absent records
    Summary {
        #[arg(short = 'C', long, default_value = "all")]
        class: String,

        #[arg(short = 'S', long, default_value = "all")]
        student: String,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Export all records to a snapshot file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short = 't', long, default_value = "snapshot")]
        format: String,
    },

    /// Import records from a snapshot file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

impl Cli {
    /// Merge `--config` file contents with command-line overrides.
    pub fn settings(&self) -> Result<Settings, RollbookError> {
        let config = RollbookConfig::load(&self.config)?;
        let (host, port) = match &self.command {
            Some(Commands::Server { host, port }) => (host.clone(), *port),
            _ => (None, None),
        };
        Ok(Settings::resolve(
            config,
            Overrides {
                backend: self.backend,
                database: self.database.clone(),
                roster: self.roster.clone(),
                today: self.today,
                host,
                port,
            },
        ))
    }

    /// The acting user, if both `--actor` and `--role` were given.
    pub fn session_actor(&self) -> Result<Option<Actor>, RollbookError> {
        match (&self.actor, self.role) {
            (Some(id), Some(role)) => {
                let id = ActorId::new(id.trim());
                id.validate()?;
                Ok(Some(Actor { id, role }))
            }
            (None, None) => Ok(None),
            _ => Err(RollbookError::ValidationFailed(
                "--actor and --role must be given together".to_string(),
            )),
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RollbookError> {
    let ctx = CommandContext {
        settings: cli.settings()?,
        actor: cli.session_actor()?,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&ctx).await,
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Mark {
            class,
            student,
            status,
            date,
            remark,
        }) => cmd_mark(&ctx, &class, &student, status, date, remark),
        Some(Commands::Submit { class, date }) => cmd_submit(&ctx, &class, date),
        Some(Commands::Unlock { class, date }) => cmd_unlock(&ctx, &class, date),
        Some(Commands::Status { student, date }) => cmd_status(&ctx, &student, date),
        Some(Commands::History { student }) => cmd_history(&ctx, &student),
        Some(Commands::Records {
            class,
            student,
            date,
        }) => cmd_records(&ctx, &class, &student, date),
        Some(Commands::Students {
            class,
            student,
            search,
        }) => cmd_students(&ctx, &class, &student, search),
        Some(Commands::Summary {
            class,
            student,
            date,
        }) => cmd_summary(&ctx, &class, &student, date),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, &format),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        None => {
            // No subcommand - summarize everything by default
            cmd_summary(&ctx, "all", "all", None)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

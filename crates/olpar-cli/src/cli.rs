use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "olpar")]
#[command(about = "Manage Olpar360 field audits from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local store (overrides config and OLPAR_DATA_DIR)
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit records
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Operator profiles
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Start an operator session
    Login {
        /// Profile id
        user_id: String,
        /// 4-digit PIN
        #[arg(long)]
        pin: String,
    },
    /// End the current session
    Logout,
    /// Show the logged-in operator
    Whoami,
    /// Show cloud connectivity
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export records
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print every change to a collection until interrupted
    Watch {
        #[arg(value_enum)]
        collection: WatchTarget,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// List records, newest first
    List {
        /// Only records captured by this auditor (profile id or name)
        #[arg(long, conflicts_with = "mine")]
        auditor: Option<String>,
        /// Only records captured by the logged-in operator
        #[arg(long)]
        mine: bool,
        /// Number of records to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one record
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Capture a new record as the logged-in operator
    Capture(CaptureArgs),
    /// Edit client metadata or replace photos of a record
    Edit(EditRecordArgs),
    /// Set the owner-facing validation status
    Status {
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Mark a record as confirmed by its owner
    Verify { id: String },
    /// Print the owner confirmation link for a record
    Link {
        id: String,
        /// Public app URL
        #[arg(long, value_name = "URL")]
        base_url: String,
    },
    /// Correct the captured position by hand
    Move {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Delete a record
    Delete { id: String },
}

#[derive(clap::Args)]
pub struct CaptureArgs {
    /// Contact or business name
    #[arg(long)]
    pub name: String,
    /// Client type (e.g. Almacén, Botillería)
    #[arg(long)]
    pub client_type: String,
    #[arg(long, default_value = "")]
    pub address: String,
    #[arg(long, default_value = "")]
    pub city: String,
    #[arg(long, default_value = "")]
    pub comuna: String,
    #[arg(long, default_value = "")]
    pub neighborhood: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub email: String,
    /// Opening time (HH:MM)
    #[arg(long, default_value = "")]
    pub open: String,
    /// Closing time (HH:MM)
    #[arg(long, default_value = "")]
    pub close: String,
    #[arg(long, default_value = "")]
    pub observations: String,
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
    /// GPS accuracy in meters
    #[arg(long, default_value = "0")]
    pub accuracy: f64,
}

/// Only the given fields change.
#[derive(clap::Args)]
pub struct EditRecordArgs {
    pub id: String,
    /// Contact or business name
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub client_type: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub comuna: Option<String>,
    #[arg(long)]
    pub neighborhood: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    /// Opening time (HH:MM)
    #[arg(long)]
    pub open: Option<String>,
    /// Closing time (HH:MM)
    #[arg(long)]
    pub close: Option<String>,
    #[arg(long)]
    pub observations: Option<String>,
    /// Replacement facade photo (JPEG, PNG or WebP)
    #[arg(long, value_name = "PATH")]
    pub facade_image: Option<PathBuf>,
    /// Replacement interior photo (JPEG, PNG or WebP)
    #[arg(long, value_name = "PATH")]
    pub interior_image: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a profile
    Add {
        #[arg(long)]
        name: String,
        /// 4-digit PIN
        #[arg(long)]
        pin: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Auditor)]
        role: RoleArg,
        /// Avatar color tag (defaults to the next palette entry)
        #[arg(long)]
        color: Option<String>,
    },
    /// Edit a profile in place
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// New 4-digit PIN
        #[arg(long)]
        pin: Option<String>,
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
        /// Avatar color tag
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a profile (never the logged-in one)
    Remove { id: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Verified,
    Reported,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RoleArg {
    Auditor,
    Admin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum WatchTarget {
    Records,
    Users,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

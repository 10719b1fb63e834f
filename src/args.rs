//! These structs provide the CLI interface for the recon CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// recon: reconcile bank deposits against event registrations.
///
/// Upload a bank-statement export, let the matcher service propose which registration each
/// deposit pays for, review the proposals, and finalize so payment statuses are updated.
///
/// The interactive review runs through the mcp subcommand, where an AI agent drives the session
/// on your behalf. The check subcommand gives a read-only preview from the command line.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the recon home directory and its config file.
    ///
    /// Run this first. You need the base URL of the registration backend's API, e.g.
    /// https://admin.example.com/api. Optionally give the event you usually reconcile so that
    /// other commands do not need --event-id.
    Init(InitArgs),
    /// Upload a bank export to the matcher and print its proposals. Nothing is finalized.
    Check(CheckArgs),
    /// Show one registration.
    Detail(DetailArgs),
    /// Run an MCP server over stdio that hosts an interactive reconciliation session.
    Mcp(McpArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the recon configuration is held. Defaults to ~/recon
    #[arg(long, env = "RECON_HOME", default_value_t = default_recon_home())]
    recon_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, recon_home: PathBuf) -> Self {
        Self {
            log_level,
            recon_home: recon_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn recon_home(&self) -> &DisplayPath {
        &self.recon_home
    }
}

/// (Not shown): Args for the `recon init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// Base URL of the registration backend's API.
    #[arg(long)]
    api_url: String,

    /// The default event to reconcile.
    #[arg(long)]
    event_id: Option<String>,
}

impl InitArgs {
    pub fn new(api_url: impl Into<String>, event_id: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            event_id,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }
}

/// (Not shown): Args for the `recon check` command.
#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    /// The bank-statement export, a .xlsx or .xls file.
    #[arg(long)]
    file: PathBuf,

    /// The event to match against. Defaults to the event in config.json.
    #[arg(long)]
    event_id: Option<String>,
}

impl CheckArgs {
    pub fn new(file: impl Into<PathBuf>, event_id: Option<String>) -> Self {
        Self {
            file: file.into(),
            event_id,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }
}

/// (Not shown): Args for the `recon detail` command.
#[derive(Debug, Parser, Clone)]
pub struct DetailArgs {
    /// The registration id.
    registration_id: String,
}

impl DetailArgs {
    pub fn new(registration_id: impl Into<String>) -> Self {
        Self {
            registration_id: registration_id.into(),
        }
    }

    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }
}

/// (Not shown): Args for the `recon mcp` command.
#[derive(Debug, Parser, Clone)]
pub struct McpArgs {}

fn default_recon_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("recon"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --recon-home or RECON_HOME instead of relying on the default \
                recon home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("recon")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

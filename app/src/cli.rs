//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Brainstorm account client
#[derive(Parser, Debug)]
#[command(name = "brainstorm", version, about)]
pub struct Cli {
    /// Refresh token of a previous session
    #[arg(long, global = true, env = "BRAINSTORM_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Account operations
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password
    Signin {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
    },

    /// Create an account and its profile record
    Signup {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        name: String,
    },

    /// End the restored session
    Signout,

    /// Show the restored principal
    Whoami,

    /// Edit the restored principal's profile
    Profile {
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New email
        #[arg(long)]
        email: Option<String>,
        /// New password
        #[arg(long)]
        password: Option<String>,
        /// New photo, as a file path or an https URL
        #[arg(long)]
        photo: Option<String>,
    },

    /// Restore a session from a refresh token
    Restore {
        /// Refresh token to exchange
        token: String,
    },
}

/// Photo argument as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoArg {
    /// Already hosted image
    Url(String),
    /// Local file to upload
    File(PathBuf),
}

impl PhotoArg {
    /// Classify a `--photo` value.
    pub fn parse(value: &str) -> Self {
        if brainstorm_session::PhotoSource::is_remote_reference(value) {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

//! Command-line interface for xsweep built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (check, delete, lookup,
//! export) and the global flags that override `xsweep.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// xsweep: rate-limited bulk delete and fetch for X/Twitter archives.
#[derive(Debug, Parser)]
#[command(name = "xsweep", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Bind address of the status/control server (overrides `listen`).
    #[arg(long, global = true)]
    pub listen: Option<String>,

    /// Seconds between two deletes (overrides `interval_secs`).
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Exit as soon as the job ends instead of serving status and logs
    /// until Ctrl-C.
    #[arg(long, global = true, default_value_t = false)]
    pub exit_when_done: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify the configured credentials against the API.
    Check,

    /// Delete every post listed in an archive, oldest first.
    Delete {
        /// `tweets.js` from a data export.
        #[arg(long)]
        archive: PathBuf,
    },

    /// Re-fetch every post listed in an archive and write what still exists.
    Lookup {
        #[arg(long)]
        archive: PathBuf,

        /// Output `tweets.js`.
        #[arg(long)]
        out: PathBuf,
    },

    /// Export a user's recent timeline as a `tweets.js` archive.
    Export {
        #[arg(long)]
        username: String,

        /// Maximum number of posts.
        #[arg(long, default_value_t = 200)]
        count: usize,

        /// Drop reposts.
        #[arg(long, default_value_t = false)]
        exclude_rts: bool,

        /// Drop replies.
        #[arg(long, default_value_t = false)]
        exclude_replies: bool,

        #[arg(long)]
        out: PathBuf,
    },
}

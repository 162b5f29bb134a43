use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line options for the feedvault server and admin tool
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the archival server
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8901", env = "FEEDVAULT_ADDR")]
        addr: String,

        /// Store directory; the meta store lives under `<db>/meta`
        #[arg(long, default_value = "feedvault-db", env = "FEEDVAULT_DB")]
        db: PathBuf,

        /// Media mirror configuration file (json with `dir` and
        /// `base_url`); mirroring is off without one
        #[arg(long, short = 'c')]
        media_config: Option<PathBuf>,
    },

    /// Run one admin maintenance command against a server
    Admin {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:8901", env = "FEEDVAULT_ADDR")]
        addr: String,

        /// Command tag, e.g. ReportJobs, PurgeJobs, RefetchUserFeed
        command: String,
    },
}

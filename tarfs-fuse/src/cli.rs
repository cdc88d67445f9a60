use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about = "Browse a tar image through the tarfs driver")]
pub struct Cli {
    /// Tar image used as the block device
    #[arg(long, short)]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List a directory
    Ls {
        /// Show type tags and file sizes
        #[arg(short)]
        long: bool,

        /// Show entries starting with `.`
        #[arg(short)]
        all: bool,

        /// Keep archive order
        #[arg(short = 'U')]
        unsorted: bool,

        /// Capacity of the listing buffer in bytes
        #[arg(long, default_value_t = 4096)]
        buffer: usize,

        #[arg(default_value = "/")]
        path: String,
    },

    /// Print a file
    Cat { path: String },
}

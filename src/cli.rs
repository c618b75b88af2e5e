//! Command-line interface definition using clap.
//!
//! This module defines [`Args`], the argument structure for the `zapview`
//! binary. The binary opens a WhatsApp export ZIP (or bare `.txt`
//! transcript), prints a summary, and optionally runs a search over it.

use clap::Parser;

/// Browse and search WhatsApp chat export archives from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "zapview")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    zapview \"WhatsApp Chat - Family.zip\"
    zapview export.zip --search birthday
    zapview export.zip --stats --contacts
    zapview _chat.txt --verbose")]
pub struct Args {
    /// Path to a WhatsApp export (.zip archive or .txt transcript)
    pub input: String,

    /// Search the chat for a query and print the matches
    #[arg(short, long, value_name = "QUERY")]
    pub search: Option<String>,

    /// Maximum number of matches to print
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub limit: usize,

    /// Print per-participant and per-hour statistics
    #[arg(long)]
    pub stats: bool,

    /// Print contacts found in attached .vcf cards
    #[arg(long)]
    pub contacts: bool,

    /// List media files in the archive
    #[arg(long)]
    pub media: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

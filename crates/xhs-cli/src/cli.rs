//! CLI argument definitions for the `xhs` binary.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Xiaohongshu assistant -- terminal client for the assistant backend.
#[derive(Parser)]
#[command(
    name = "xhs",
    version,
    about = "Xiaohongshu assistant client",
    long_about = "Chat with the Xiaohongshu assistant, run searches, and follow \
                  analysis tasks from the terminal. Without a subcommand the \
                  terminal UI starts."
)]
pub struct Cli {
    /// Backend base URL (overrides config and XHS_BASE_URL).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Config file with a `[client]` table.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the terminal UI (the default).
    Tui,

    /// Search notes by keyword and print the results.
    Search {
        /// The keyword to search for.
        keyword: String,
    },

    /// Send one chat message and print the streamed reply.
    Chat {
        /// The message to send.
        message: String,

        /// Stop after this many seconds without a reply frame.
        #[arg(long, default_value_t = 10)]
        idle_secs: u64,
    },

    /// List the search tasks of a session.
    Tasks {
        /// Session whose tasks to list.
        #[arg(long)]
        client_id: String,
    },

    /// Open the Xiaohongshu front page in the backend browser.
    Open,

    /// Run the backend browser self-test and print the OCR text.
    TestBrowser {
        /// Write the decoded screenshot to this file.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Open a note in the backend browser.
    OpenNote {
        note_id: String,
        xsec_token: String,
    },

    /// Cancel a running search task.
    Cancel {
        task_id: String,

        /// Session that owns the task.
        #[arg(long)]
        client_id: String,
    },
}

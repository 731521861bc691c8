//! CLI interface for ReqLab
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for driving the group chat.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ReqLab requirements lab
///
/// Talk to a simulated product team (PM, SA, PG) that interviews you,
/// designs the system and writes the code, saving generated files per session.
#[derive(Parser, Debug)]
#[command(name = "reqlab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive group chat
    Chat {
        /// Session id for generated files (default: a new UUID)
        #[arg(short, long)]
        session: Option<String>,

        /// Wait for each complete reply instead of streaming tokens
        #[arg(long)]
        no_stream: bool,
    },

    /// Extract annotated code blocks from a saved transcript
    Extract {
        /// Transcript file to scan
        file: PathBuf,

        /// Session id to write files under
        #[arg(short, long)]
        session: String,
    },

    /// List the agents in the roster
    Agents,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage API keys in the system keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
}

/// API key management actions
#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Store an API key (prompted without echo)
    Set {
        /// Key name (e.g., "openai_api_key", "azure_openai_api_key")
        name: String,
    },

    /// Show whether each known API key is available
    Status,
}

//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::config::Settings;

/// Drillchat - AI drilling assistant chat client and backend
#[derive(Parser, Debug)]
#[command(name = "drillchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub settings: Settings,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat with the drilling assistant
    Chat {
        /// Where replies come from
        #[arg(short, long, value_enum, default_value_t = Backend::Gemini)]
        backend: Backend,

        /// Continue an existing session (session backend only)
        #[arg(short, long)]
        session: Option<String>,

        /// Start without the greeting message
        #[arg(long)]
        no_welcome: bool,
    },

    /// Ask a single question and print the reply
    Ask {
        /// Where the reply comes from
        #[arg(short, long, value_enum, default_value_t = Backend::Gemini)]
        backend: Backend,

        /// Question to ask
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },

    /// Show the stored history of a session
    History {
        /// Session ID to show
        #[arg(short, long)]
        session: String,
    },

    /// Delete the stored history of a session
    Clear {
        /// Session ID to clear
        #[arg(short, long)]
        session: String,
    },

    /// Run the chat backend
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

/// Reply sources a chat surface can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Call the language model directly, one turn at a time
    Gemini,
    /// Use the chat backend, which keeps per-session history
    Session,
}

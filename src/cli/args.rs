//! CLI argument definitions using clap
//!
//! Commands:
//! - journalstore init --config <path>
//! - journalstore inspect --config <path>
//! - journalstore read --config <path> --type-name <name> --uid <uid>
//! - journalstore remove --config <path> --type-name <name> --uid <uid>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// journalstore - committed object state over an append-only journal
#[derive(Parser, Debug)]
#[command(name = "journalstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new store directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./journalstore.json")]
        config: PathBuf,
    },

    /// Recover the store and print its types and recovery report
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./journalstore.json")]
        config: PathBuf,
    },

    /// Print the committed state of one object
    Read {
        /// Path to configuration file
        #[arg(long, default_value = "./journalstore.json")]
        config: PathBuf,

        /// Type name the object is stored under
        #[arg(long)]
        type_name: String,

        /// Object uid, hyphenated
        #[arg(long)]
        uid: String,
    },

    /// Remove the committed state of one object
    Remove {
        /// Path to configuration file
        #[arg(long, default_value = "./journalstore.json")]
        config: PathBuf,

        /// Type name the object is stored under
        #[arg(long)]
        type_name: String,

        /// Object uid, hyphenated
        #[arg(long)]
        uid: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read() {
        let cli = Cli::try_parse_from([
            "journalstore",
            "read",
            "--config",
            "/tmp/store.json",
            "--type-name",
            "T",
            "--uid",
            "00000000-0000-0000-0000-000000000000",
        ])
        .unwrap();
        match cli.command {
            Command::Read { config, type_name, uid } => {
                assert_eq!(config, PathBuf::from("/tmp/store.json"));
                assert_eq!(type_name, "T");
                assert_eq!(uid, "00000000-0000-0000-0000-000000000000");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_defaults() {
        let cli = Cli::try_parse_from(["journalstore", "inspect"]).unwrap();
        assert!(matches!(cli.command, Command::Inspect { config } if config == PathBuf::from("./journalstore.json")));
    }

    #[test]
    fn test_remove_requires_uid() {
        assert!(Cli::try_parse_from(["journalstore", "remove", "--type-name", "T"]).is_err());
    }
}

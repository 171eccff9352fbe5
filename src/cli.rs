use std::path::PathBuf;

use chatgate_config::constants::paths;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chatgate", version, about = "Chat-driven command broker and agent")]
pub struct Cli {
    /// Fallback log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Receive chat messages and run them through the command pipeline
    Broker {
        /// Broker configuration file (.json or .toml)
        #[arg(long, default_value = paths::BROKER_CONFIG)]
        config: PathBuf,
    },
    /// Serve `/command` for brokers running in forward mode
    Agent {
        /// Agent configuration file (.json or .toml)
        #[arg(long, default_value = paths::AGENT_CONFIG)]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_default_their_config_paths() {
        let cli = Cli::try_parse_from(["chatgate", "broker"]).unwrap();
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Broker { config } => {
                assert_eq!(config, PathBuf::from("configs/broker.json"));
            }
            Commands::Agent { .. } => panic!("expected broker"),
        }

        let cli = Cli::try_parse_from([
            "chatgate",
            "agent",
            "--config",
            "/etc/agent.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Agent { config } => assert_eq!(config, PathBuf::from("/etc/agent.toml")),
            Commands::Broker { .. } => panic!("expected agent"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["chatgate"]).is_err());
    }
}

//! Command-line interface definitions

use clap::{Parser, Subcommand};

use crate::config::EnvKind;

#[derive(Parser, Debug)]
#[command(name = "ppo-engine")]
#[command(version = "0.1.0")]
#[command(about = "Trust-region policy optimization engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (built-in defaults when omitted)
    #[arg(short, long, global = true, env = "PPO_ENGINE_CONFIG")]
    pub config: Option<String>,

    /// Emit JSON formatted logs
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a policy on a built-in environment
    Train {
        /// Environment to train on
        #[arg(short, long, value_enum)]
        env: Option<EnvKind>,
        /// Number of training rounds
        #[arg(short, long)]
        rounds: Option<usize>,
        /// Environment / backend seed
        #[arg(long)]
        seed: Option<u64>,
        /// Checkpoint directory for saving models
        #[arg(long)]
        checkpoint_dir: Option<String>,
        /// Run name used for checkpoint files
        #[arg(short, long, default_value = "ppo")]
        name: String,
        /// Resume from the latest checkpoint of the run
        #[arg(long)]
        resume: bool,
    },
    /// Evaluate a saved policy with deterministic actions
    Eval {
        /// Run name of the checkpoint
        #[arg(short, long, default_value = "ppo")]
        name: String,
        /// Checkpoint step (latest when omitted)
        #[arg(short, long)]
        step: Option<u64>,
        /// Number of evaluation episodes
        #[arg(short, long, default_value = "10")]
        episodes: usize,
        /// Environment to evaluate on
        #[arg(long, value_enum)]
        env: Option<EnvKind>,
        /// Checkpoint directory
        #[arg(long)]
        checkpoint_dir: Option<String>,
    },
    /// Print the default configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train() {
        let cli = Cli::parse_from([
            "ppo-engine",
            "train",
            "--env",
            "corridor",
            "--rounds",
            "3",
            "--resume",
        ]);
        match cli.command {
            Commands::Train {
                env, rounds, resume, ..
            } => {
                assert_eq!(env, Some(EnvKind::Corridor));
                assert_eq!(rounds, Some(3));
                assert!(resume);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

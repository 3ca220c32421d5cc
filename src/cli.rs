//! Command-line interface definition for MathTutor
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive chat and the one-shot solve command.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MathTutor - Socratic math tutoring from a photo of the problem
///
/// Upload an image of a math problem and get guided one step at a time
/// by a hosted model.
#[derive(Parser, Debug, Clone)]
#[command(name = "mathtutor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for MathTutor
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive tutoring chat
    Chat {
        /// Problem image to start with
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Upload one problem image, optionally ask questions, print the transcript
    Solve {
        /// Problem image to upload
        #[arg(short, long)]
        image: PathBuf,

        /// Message to send after the first reply (repeatable)
        #[arg(short, long)]
        ask: Vec<String>,

        /// Finish by sending the follow-up question
        #[arg(long)]
        why: bool,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },
}

impl Commands {
    /// Model requested on the command line, if any
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::cli::Commands;
    ///
    /// let command = Commands::Chat { image: None, model: Some("gemini-2.5-pro".into()) };
    /// assert_eq!(command.model_override(), Some("gemini-2.5-pro"));
    /// ```
    pub fn model_override(&self) -> Option<&str> {
        match self {
            Commands::Chat { model, .. } | Commands::Solve { model, .. } => model.as_deref(),
        }
    }
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Chat {
                image: None,
                model: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Chat {
                image: None,
                model: None
            }
        ));
    }

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["mathtutor", "chat"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert!(matches!(cli.command, Commands::Chat { .. }));
    }

    #[test]
    fn test_cli_parse_chat_with_image_and_model() {
        let cli = Cli::try_parse_from([
            "mathtutor",
            "chat",
            "--image",
            "photo.png",
            "--model",
            "gemini-2.5-pro",
        ])
        .unwrap();
        if let Commands::Chat { image, model } = cli.command {
            assert_eq!(image, Some(PathBuf::from("photo.png")));
            assert_eq!(model, Some("gemini-2.5-pro".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_solve_command() {
        let cli = Cli::try_parse_from([
            "mathtutor",
            "solve",
            "--image",
            "photo.png",
            "--ask",
            "is it 4?",
            "--ask",
            "subtract 3",
            "--why",
            "--json",
        ])
        .unwrap();
        if let Commands::Solve {
            image,
            ask,
            why,
            json,
            model,
        } = cli.command
        {
            assert_eq!(image, PathBuf::from("photo.png"));
            assert_eq!(ask, vec!["is it 4?".to_string(), "subtract 3".to_string()]);
            assert!(why);
            assert!(json);
            assert_eq!(model, None);
        } else {
            panic!("Expected Solve command");
        }
    }

    #[test]
    fn test_cli_parse_solve_requires_image() {
        let cli = Cli::try_parse_from(["mathtutor", "solve"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["mathtutor", "--config", "custom.yaml", "chat"]).unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
    }

    #[test]
    fn test_cli_parse_with_verbose() {
        let cli = Cli::try_parse_from(["mathtutor", "-v", "chat"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_invalid_command() {
        let cli = Cli::try_parse_from(["mathtutor", "invalid"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_model_override() {
        let cli = Cli::try_parse_from(["mathtutor", "solve", "-i", "a.png", "-m", "m1"]).unwrap();
        assert_eq!(cli.command.model_override(), Some("m1"));
        assert_eq!(Cli::default().command.model_override(), None);
    }
}

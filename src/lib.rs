//! MathTutor - Socratic math tutoring library
//!
//! This library provides the core of the MathTutor CLI: a controller that
//! turns a photo of a math problem into a guided, one-step-at-a-time
//! conversation with a hosted model.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `tutor`: Message store, image encoder and the session controller
//! - `providers`: Session client abstraction and the Gemini implementation
//! - `prompts`: Built-in Socratic system instruction
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Chat and solve command handlers
//!
//! # Example
//!
//! ```no_run
//! use mathtutor::{Config, Controller};
//! use mathtutor::providers::create_session_client;
//! use mathtutor::tutor::TutorSettings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let client = create_session_client(&config.provider)?;
//!     let mut controller = Controller::new(client, TutorSettings::from_config(&config));
//!     controller
//!         .upload_image_and_wait(std::path::Path::new("problem.png"))
//!         .await
//!         .into_result()?;
//!     for entry in controller.store().entries() {
//!         println!("{:?}", entry.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod tutor;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TutorError};
pub use tutor::Controller;

#[cfg(test)]
pub mod test_utils;

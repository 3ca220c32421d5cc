//! Special commands parser for the interactive tutoring chat
//!
//! This module parses the commands that can be entered during an interactive
//! chat instead of an answer. Special commands let users:
//! - Upload a new problem image
//! - Ask the follow-up question
//! - Start over without a problem
//! - View session status and help
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive; arguments (such as
//! file paths) keep their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during the interactive chat
///
/// These commands drive the controller directly rather than being sent to
/// the tutor as an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Upload a problem image and start a fresh session
    Image(PathBuf),

    /// Send the follow-up question ("Why did we do that?")
    Why,

    /// Drop the current session and clear the chat
    New,

    /// Display session status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be submitted to the tutor as text.
    None,
}

/// Parse a user input string into a special command
///
/// # Arguments
///
/// * `input` - The user input string to parse
///
/// # Returns
///
/// Returns Ok(SpecialCommand) for valid commands or SpecialCommand::None for non-commands.
///
/// # Errors
///
/// Returns CommandError::UnknownCommand if input starts with "/" but is not a valid command.
/// Returns CommandError::UnsupportedArgument if a command that takes no argument receives one.
/// Returns CommandError::MissingArgument if `/image` has no path.
///
/// # Examples
///
/// ```
/// use mathtutor::commands::special_commands::{parse_special_command, SpecialCommand};
/// use std::path::PathBuf;
///
/// let cmd = parse_special_command("/image Homework/Q1.png").unwrap();
/// assert_eq!(cmd, SpecialCommand::Image(PathBuf::from("Homework/Q1.png")));
///
/// let cmd = parse_special_command("/WHY").unwrap();
/// assert_eq!(cmd, SpecialCommand::Why);
///
/// let cmd = parse_special_command("x = 4").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // If input doesn't start with "/", it's not a command (except exit/quit)
    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/image" | "/upload" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/image".to_string(),
                    usage: "/image <path>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Image(PathBuf::from(strip_quotes(arg))))
            }
        }
        "/why" => no_argument(&name, arg, SpecialCommand::Why),
        "/new" | "/reset" => no_argument(&name, arg, SpecialCommand::New),
        "/status" => no_argument(&name, arg, SpecialCommand::ShowStatus),
        "/help" | "/?" => no_argument(&name, arg, SpecialCommand::Help),
        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(name)),
    }
}

fn no_argument(
    command: &str,
    arg: &str,
    parsed: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    if arg.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        })
    }
}

/// Removes one pair of matching surrounding quotes, as left by drag-and-drop
fn strip_quotes(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}

/// Display help text for special commands
///
/// # Arguments
///
/// * `follow_up_prompt` - Text `/why` sends
pub fn print_help(follow_up_prompt: &str) {
    println!(
        r#"
Special Commands for the Tutoring Chat
======================================

PROBLEM:
  /image <path>   - Upload a photo of a math problem (starts a new session)
  /upload <path>  - Same as /image
  /new            - Forget the current problem and clear the chat

GUIDANCE:
  /why            - Ask "{}"
  anything else   - Sent to the tutor as your answer or question

SESSION:
  /status         - Show the session state
  /help           - Show this help message
  /?              - Same as /help
  exit            - Exit interactive mode
  quit            - Same as exit

NOTES:
  - Commands are case-insensitive; paths keep their case
  - The tutor works one step at a time and waits for your answer
"#,
        follow_up_prompt
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_with_path() {
        let cmd = parse_special_command("/image photo.png").unwrap();
        assert_eq!(cmd, SpecialCommand::Image(PathBuf::from("photo.png")));
    }

    #[test]
    fn test_parse_image_keeps_path_case_and_spaces() {
        let cmd = parse_special_command("/IMAGE  My Photos/Q 1.PNG ").unwrap();
        assert_eq!(cmd, SpecialCommand::Image(PathBuf::from("My Photos/Q 1.PNG")));
    }

    #[test]
    fn test_parse_image_strips_quotes() {
        let cmd = parse_special_command("/upload '/tmp/problem one.jpg'").unwrap();
        assert_eq!(
            cmd,
            SpecialCommand::Image(PathBuf::from("/tmp/problem one.jpg"))
        );
    }

    #[test]
    fn test_parse_image_missing_path() {
        let err = parse_special_command("/image").unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { .. }));
        assert!(err.to_string().contains("/image <path>"));
    }

    #[test]
    fn test_parse_why() {
        assert_eq!(parse_special_command("/why").unwrap(), SpecialCommand::Why);
    }

    #[test]
    fn test_parse_new_and_reset() {
        assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::New);
        assert_eq!(parse_special_command("/reset").unwrap(), SpecialCommand::New);
    }

    #[test]
    fn test_parse_show_status() {
        assert_eq!(
            parse_special_command("/status").unwrap(),
            SpecialCommand::ShowStatus
        );
    }

    #[test]
    fn test_parse_help() {
        assert_eq!(parse_special_command("/help").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
    }

    #[test]
    fn test_parse_exit_and_quit() {
        for input in ["exit", "quit", "/exit", "/quit", "EXIT"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_parse_regular_text() {
        assert_eq!(
            parse_special_command("I think x = 4").unwrap(),
            SpecialCommand::None
        );
        assert_eq!(
            parse_special_command("exit the loop?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_parse_unexpected_argument() {
        let err = parse_special_command("/why now").unwrap_err();
        assert_eq!(
            err,
            CommandError::UnsupportedArgument {
                command: "/why".to_string(),
                arg: "now".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        let err = parse_special_command("/solve it").unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("/solve".to_string()));
        assert!(err.to_string().contains("/help"));
    }
}

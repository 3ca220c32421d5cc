//! System prompts for tutoring sessions
//!
//! This module provides the fixed system instruction installed on every new
//! chat session and the literal follow-up question offered after each reply.

pub mod socratic_prompt;

pub use socratic_prompt::socratic_system_instruction;

/// Text submitted when the user asks for the reasoning behind the last step
pub const FOLLOW_UP_PROMPT: &str = "Why did we do that?";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_prompt_literal() {
        assert_eq!(FOLLOW_UP_PROMPT, "Why did we do that?");
    }

    #[test]
    fn test_reexported_instruction_matches_module() {
        assert_eq!(
            socratic_system_instruction(),
            socratic_prompt::socratic_system_instruction()
        );
    }
}

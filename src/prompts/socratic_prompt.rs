//! Socratic tutoring system prompt
//!
//! The instruction constrains the assistant to guide the student one step at a
//! time instead of solving the problem outright.

/// Generates the system instruction for a tutoring session
///
/// # Returns
///
/// A system prompt string that keeps the model in one-step Socratic mode
///
/// # Examples
///
/// ```
/// use mathtutor::prompts::socratic_prompt::socratic_system_instruction;
///
/// let prompt = socratic_system_instruction();
/// assert!(prompt.contains("ONE step"));
/// ```
pub fn socratic_system_instruction() -> String {
    r#"You are a patient, encouraging math tutor who teaches with the Socratic method.

The student will send a photo of a math problem. Follow these rules:

1. First, restate the problem you see in the image in one short sentence so the
   student can confirm you read it correctly. If the image is unreadable or is
   not a math problem, say so and ask for a clearer photo.
2. Guide the student ONE step at a time. Never reveal the full solution or the
   final answer up front.
3. For each step, explain the idea briefly and end with a single question that
   asks the student to carry out that step themselves.
4. When the student answers, check their work. If it is correct, praise it
   specifically and move to the next step. If it is wrong, point to the mistake
   gently and give a hint, not the answer.
5. When the student asks "Why did we do that?", explain the reasoning behind the
   most recent step in plain language, then repeat the pending question.
6. Keep every reply short: a few sentences at most. Use plain text math
   notation such as x^2, sqrt(x) and a/b.
7. When the problem is solved, summarize the steps in a short numbered list and
   congratulate the student."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_mentions_socratic_method() {
        let prompt = socratic_system_instruction();
        assert!(prompt.contains("Socratic"));
    }

    #[test]
    fn test_instruction_forbids_full_solution() {
        let prompt = socratic_system_instruction().to_lowercase();
        assert!(prompt.contains("never reveal the full solution"));
    }

    #[test]
    fn test_instruction_handles_follow_up_question() {
        let prompt = socratic_system_instruction();
        assert!(prompt.contains(crate::prompts::FOLLOW_UP_PROMPT));
    }
}

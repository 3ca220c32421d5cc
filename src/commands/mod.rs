/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `chat`: Interactive tutoring chat
- `solve`: One-shot upload, optional follow-ups, transcript output

Both build a session client from configuration and drive a
[`Controller`](crate::tutor::Controller).
*/

use crate::config::Config;
use crate::error::Result;
use crate::providers::{create_session_client, SessionClient};
use crate::tutor::{Controller, TutorSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Special commands parser for the chat loop
pub mod special_commands;

// Terminal and JSON transcript output
pub mod transcript;

/// Builds a controller from configuration
///
/// # Errors
///
/// Returns error if the configured provider is unknown or its client cannot
/// be built
pub fn build_controller(config: &Config) -> Result<Controller> {
    let client = create_session_client(&config.provider)?;
    Ok(Controller::new(client, TutorSettings::from_config(config)))
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Runs a readline loop: `/image <path>` starts a problem, other lines are
    //! sent to the tutor as answers, and the transcript is re-rendered from the
    //! message store after every action.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::commands::transcript::TranscriptView;
    use crate::tutor::ReplyOutcome;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// What the loop should do after a line
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LoopControl {
        /// Read the next line
        Continue,
        /// Leave the chat
        Exit,
    }

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `image` - Optional problem image to upload before the first prompt
    ///
    /// # Errors
    ///
    /// Returns error if the session client or line editor cannot be created
    pub async fn run_chat(config: Config, image: Option<PathBuf>) -> Result<()> {
        tracing::info!("Starting interactive tutoring chat");

        let mut controller = build_controller(&config)?;
        let mut view = TranscriptView::new();
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&config);

        if let Some(path) = image {
            upload(&mut controller, &mut view, &path).await;
        }

        loop {
            match rl.readline(&format_prompt(&controller)) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    if handle_line(&mut controller, &mut view, trimmed).await == LoopControl::Exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Handles one non-empty input line
    pub async fn handle_line(
        controller: &mut Controller,
        view: &mut TranscriptView,
        line: &str,
    ) -> LoopControl {
        let command = match parse_special_command(line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                return LoopControl::Continue;
            }
        };

        match command {
            SpecialCommand::Image(path) => upload(controller, view, &path).await,
            SpecialCommand::Why => {
                if !controller.has_session() {
                    println!("Upload a problem first with /image <path>\n");
                    return LoopControl::Continue;
                }
                let outcome = controller.follow_up_and_wait().await;
                show(controller, view, &outcome);
            }
            SpecialCommand::New => {
                controller.reset();
                view.take_unseen(controller.store());
                println!("Cleared. Upload a new problem with /image <path>\n");
            }
            SpecialCommand::ShowStatus => print_status_display(controller),
            SpecialCommand::Help => print_help(&controller.settings().follow_up_prompt),
            SpecialCommand::Exit => return LoopControl::Exit,
            SpecialCommand::None => {
                if !controller.has_session() {
                    println!("Upload a problem first with /image <path>\n");
                    return LoopControl::Continue;
                }
                let outcome = controller.submit_text_and_wait(line).await;
                show(controller, view, &outcome);
            }
        }
        LoopControl::Continue
    }

    async fn upload(controller: &mut Controller, view: &mut TranscriptView, path: &Path) {
        println!("{}", "Reading the problem...".bright_black());
        let outcome = controller.upload_image_and_wait(path).await;
        show(controller, view, &outcome);
    }

    fn show(controller: &Controller, view: &mut TranscriptView, outcome: &ReplyOutcome) {
        if matches!(outcome, ReplyOutcome::Busy) {
            eprintln!("{}", "Still waiting for the last reply".yellow());
        }
        view.render(
            controller.store(),
            controller.flags(),
            &controller.settings().follow_up_prompt,
        );
    }

    fn format_prompt(controller: &Controller) -> String {
        if controller.has_session() {
            format!("{} ", "answer>".green().bold())
        } else {
            format!("{} ", "mathtutor>".cyan().bold())
        }
    }

    fn print_welcome_banner(config: &Config) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              MathTutor Interactive Chat - Welcome!           ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Model: {}", config.provider.gemini.model.cyan());
        println!("Upload a photo of your problem with '/image <path>'.");
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn print_status_display(controller: &Controller) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    MathTutor Session Status                  ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("State:             {}", controller.phase());
        match controller.session_id() {
            Some(id) => println!("Session:           #{}", id),
            None => println!("Session:           none"),
        }
        println!("Model:             {}", controller.settings().model.model);
        if let Some(problem) = controller.problem() {
            println!("Problem:           {}", problem);
        }
        println!("Messages:          {}", controller.store().len());
        println!("Session History:   {} turns", controller.session_history_len());
        if let Some(error) = &controller.flags().error {
            println!("Last Error:        {}", error.red());
        }
        println!();
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::providers::fake::ScriptedClient;
        use crate::test_utils::{create_test_png, temp_dir};
        use crate::tutor::Phase;

        fn controller(client: &ScriptedClient) -> Controller {
            Controller::new(Arc::new(client.clone()), TutorSettings::default())
        }

        #[tokio::test]
        async fn test_run_chat_unknown_provider() {
            let mut cfg = Config::default();
            cfg.provider.provider_type = "invalid_provider".to_string();

            let res = run_chat(cfg, None).await;
            assert!(res.is_err());
        }

        #[tokio::test]
        async fn test_handle_line_image_then_answer() {
            let dir = temp_dir();
            let photo = create_test_png(&dir, "photo.png", 2, 2);
            let client = ScriptedClient::new();
            client.reply("What do you see?").reply("Good.");
            let mut controller = controller(&client);
            let mut view = TranscriptView::new();

            let line = format!("/image {}", photo.display());
            assert_eq!(
                handle_line(&mut controller, &mut view, &line).await,
                LoopControl::Continue
            );
            assert_eq!(controller.store().len(), 2);

            handle_line(&mut controller, &mut view, "a linear equation").await;
            assert_eq!(controller.store().len(), 4);
            assert_eq!(controller.phase(), Phase::Ready);
        }

        #[tokio::test]
        async fn test_handle_line_text_without_problem_sends_nothing() {
            let client = ScriptedClient::new();
            let mut controller = controller(&client);
            let mut view = TranscriptView::new();

            handle_line(&mut controller, &mut view, "hello").await;
            handle_line(&mut controller, &mut view, "/why").await;
            assert!(client.sent_turns().is_empty());
            assert!(controller.store().is_empty());
        }

        #[tokio::test]
        async fn test_handle_line_why_and_new() {
            let dir = temp_dir();
            let photo = create_test_png(&dir, "photo.png", 2, 2);
            let client = ScriptedClient::new();
            client.reply("first").reply("because");
            let mut controller = controller(&client);
            let mut view = TranscriptView::new();

            handle_line(&mut controller, &mut view, &format!("/image {}", photo.display())).await;
            handle_line(&mut controller, &mut view, "/why").await;
            assert_eq!(controller.store().entries()[2].payload(), "Why did we do that?");

            handle_line(&mut controller, &mut view, "/new").await;
            assert_eq!(controller.phase(), Phase::Idle);
            assert!(controller.store().is_empty());
        }

        #[tokio::test]
        async fn test_handle_line_exit_and_bad_command() {
            let client = ScriptedClient::new();
            let mut controller = controller(&client);
            let mut view = TranscriptView::new();

            assert_eq!(
                handle_line(&mut controller, &mut view, "/bogus").await,
                LoopControl::Continue
            );
            assert_eq!(
                handle_line(&mut controller, &mut view, "quit").await,
                LoopControl::Exit
            );
        }
    }
}

// Solve command handler
pub mod solve {
    //! One-shot solve handler.
    //!
    //! Uploads the image, sends each `--ask` message and optionally the
    //! follow-up question, then prints the transcript. The first failing step
    //! stops the run and becomes the command's error.

    use super::*;
    use crate::commands::transcript::{format_transcript, TranscriptDocument};
    use std::io::Write;

    /// Options for a solve run
    #[derive(Debug, Clone, Default)]
    pub struct SolveOptions {
        /// Problem image
        pub image: PathBuf,
        /// Messages sent after the first reply, in order
        pub ask: Vec<String>,
        /// Send the follow-up question last
        pub why: bool,
        /// Print JSON instead of plain text
        pub json: bool,
    }

    /// Run a solve with a client built from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be built, any step fails, or the
    /// transcript cannot be written
    pub async fn run_solve(config: Config, options: SolveOptions) -> Result<()> {
        tracing::info!("Starting one-shot solve for {}", options.image.display());
        let client = create_session_client(&config.provider)?;
        let settings = TutorSettings::from_config(&config);
        let mut out = std::io::stdout();
        run_solve_with_client(client, settings, &options, &mut out).await
    }

    /// Run a solve against the given client, writing the transcript to `out`
    ///
    /// The transcript is written even when a step fails, so the partial
    /// conversation is not lost; the failure is returned afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first failed step, or a write/serialization error
    pub async fn run_solve_with_client(
        client: Arc<dyn SessionClient>,
        settings: TutorSettings,
        options: &SolveOptions,
        out: &mut dyn Write,
    ) -> Result<()> {
        let mut controller = Controller::new(client, settings);
        let result = drive(&mut controller, options).await;

        if options.json {
            let document = TranscriptDocument {
                model: &controller.settings().model.model,
                entries: controller.store().entries(),
                error: controller.flags().error.as_deref(),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
        } else if !controller.store().is_empty() {
            writeln!(out, "{}", format_transcript(controller.store().entries()))?;
        }

        result
    }

    async fn drive(controller: &mut Controller, options: &SolveOptions) -> Result<()> {
        controller
            .upload_image_and_wait(&options.image)
            .await
            .into_result()?;
        for message in &options.ask {
            controller.submit_text_and_wait(message).await.into_result()?;
        }
        if options.why {
            controller.follow_up_and_wait().await.into_result()?;
        }
        Ok(())
    }

}

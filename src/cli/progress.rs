use anyhow::{bail, Result};
use refactor_studio::data::{ActivityState, NoticeLevel, PanelMessage};
use std::time::Instant;

/// Human-readable rendering of session messages for one-shot commands.
pub struct ActivityReport {
    verbose: bool,
    written: usize,
    warnings: usize,
    failure: Option<String>,
    start_time: Instant,
}

impl ActivityReport {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            written: 0,
            warnings: 0,
            failure: None,
            start_time: Instant::now(),
        }
    }

    pub fn show(&mut self, message: &PanelMessage) {
        match message {
            PanelMessage::Status { state, kind } => {
                if self.verbose {
                    match (state, kind) {
                        (ActivityState::Busy, Some(kind)) => println!("Waiting for {} ...", kind),
                        (ActivityState::Busy, None) => println!("Waiting ..."),
                        (ActivityState::Idle, _) => println!("Idle"),
                    }
                }
            }
            PanelMessage::Rejected { reason, .. } => {
                self.failure = Some(reason.clone());
                eprintln!("Rejected: {}", reason);
            }
            PanelMessage::GenerateComplete { files } => {
                self.written = files.len();
                for file in files {
                    println!("  wrote {}", file);
                }
            }
            PanelMessage::Response { data } => {
                println!("{}", data.question);
            }
            PanelMessage::ReviewResponse { messages } => {
                if messages.is_empty() {
                    println!("No feedback returned");
                }
                for (i, text) in messages.iter().enumerate() {
                    println!("\n[{}] {}", i + 1, text);
                }
            }
            PanelMessage::ReviewError { error } => {
                self.failure = Some(error.clone());
                eprintln!("Review failed: {}", error);
            }
            PanelMessage::AnswerFile { path, .. } => {
                println!("Reference solution: {}", path);
            }
            PanelMessage::Notice { level, text } => match level {
                NoticeLevel::Info => {
                    if self.verbose {
                        println!("{}", text);
                    }
                }
                NoticeLevel::Warning => {
                    self.warnings += 1;
                    eprintln!("Warning: {}", text);
                }
                NoticeLevel::Error => {
                    self.failure = Some(text.clone());
                    eprintln!("Error: {}", text);
                }
            },
        }
    }

    /// Prints the summary and turns a reported failure into an error.
    pub fn finish(self, action: &str) -> Result<()> {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Files:     {}", self.written);
        println!("  Warnings:  {}", self.warnings);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        println!("{}", "=".repeat(60));

        if let Some(reason) = self.failure {
            bail!("{} failed: {}", action, reason);
        }
        Ok(())
    }
}

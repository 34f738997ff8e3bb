//! Terminal implementation of the clarification channel.

use super::output::Output;
use crate::research::clarify::UserInteraction;

/// Asks clarifying questions on stdout and reads answers from stdin.
pub struct TerminalInteraction {
    output: Output,
}

impl TerminalInteraction {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl UserInteraction for TerminalInteraction {
    fn ask(&self, question: &str) -> String {
        match self.output.prompt(question) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read an answer from stdin");
                String::new()
            }
        }
    }
}

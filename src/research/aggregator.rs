//! Final report assembly. Pure and deterministic.

use crate::research::supervisor::{Conclusion, SupervisorState, Termination};
use serde::Serialize;

pub const FINDINGS_HEADER: &str = "--- Consolidated Findings ---";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalReport {
    pub termination: Termination,
    pub iterations: usize,
    pub content: String,
}

/// Compose the summary and every iteration, in append order, into the report.
pub fn aggregate(state: &SupervisorState, conclusion: &Conclusion) -> FinalReport {
    let mut content = String::new();
    if !conclusion.summary.trim().is_empty() {
        content.push_str(conclusion.summary.trim());
        content.push_str("\n\n");
    }
    content.push_str(FINDINGS_HEADER);
    content.push('\n');
    for (i, iteration) in state.iterations().iter().enumerate() {
        content.push_str(&format!(
            "Iteration #{}\nSubtopics: {}\n{}\n\n",
            i + 1,
            iteration.subtopics.join(", "),
            iteration.findings_summary
        ));
    }

    FinalReport {
        termination: conclusion.termination,
        iterations: state.iterations().len(),
        content: content.trim().to_string(),
    }
}

use std::sync::OnceLock;

use regex::Regex;

/// Appended when a step fails after the planner answered.
pub const FAILURE_MARKER: &str = "Execution failed.";

/// Used when the planner's explanation carries no `Action:` line.
pub const DEFAULT_SUMMARY: &str = "Performed an action.";

/// Append-only log of one-line step summaries. Only the window read from it
/// is bounded; entries are never dropped or reordered.
#[derive(Debug, Clone)]
pub struct SemanticHistory {
    entries: Vec<String>,
    window: usize,
}

impl SemanticHistory {
    pub fn new(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn record_failure(&mut self) {
        self.push(FAILURE_MARKER);
    }

    /// The last `window` entries, oldest first, newline-joined.
    pub fn window(&self) -> String {
        let start = self.entries.len().saturating_sub(self.window);
        self.entries[start..].join("\n")
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

fn action_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action:\s*(.*)").expect("static regex"))
}

/// Pulls the text after the first `Action:` label out of the planner's
/// free-form explanation.
pub fn extract_action_summary(raw: &str) -> String {
    action_line_regex()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_empty_for_new_history() {
        let history = SemanticHistory::new(5);
        assert!(history.entries().is_empty());
        assert_eq!(history.window(), "");
    }

    #[test]
    fn window_holds_everything_below_the_limit() {
        let mut history = SemanticHistory::new(5);
        history.push("one");
        history.push("two");
        assert_eq!(history.window(), "one\ntwo");
    }

    #[test]
    fn window_keeps_last_entries_in_order() {
        let mut history = SemanticHistory::new(5);
        for i in 1..=8 {
            history.push(format!("step {i}"));
        }
        assert_eq!(history.window(), "step 4\nstep 5\nstep 6\nstep 7\nstep 8");
        assert_eq!(history.entries().len(), 8);
        assert_eq!(history.entries()[0], "step 1");
    }

    #[test]
    fn zero_window_sends_nothing() {
        let mut history = SemanticHistory::new(0);
        history.push("one");
        assert_eq!(history.window(), "");
    }

    #[test]
    fn failure_marker_is_appended() {
        let mut history = SemanticHistory::new(5);
        history.record_failure();
        assert_eq!(history.entries(), &[FAILURE_MARKER.to_string()]);
    }

    #[test]
    fn summary_comes_from_first_action_line() {
        let raw = "Thought: notepad is closed.\nAction: Click the Start button.  \nAction: ignored";
        assert_eq!(extract_action_summary(raw), "Click the Start button.");
    }

    #[test]
    fn summary_label_may_appear_mid_line() {
        assert_eq!(extract_action_summary("Next Action:type hello"), "type hello");
    }

    #[test]
    fn summary_falls_back_to_default() {
        assert_eq!(extract_action_summary("I will click it."), DEFAULT_SUMMARY);
        assert_eq!(extract_action_summary(""), DEFAULT_SUMMARY);
    }
}

use std::time::Duration;

use crate::agent_engine::history::extract_action_summary;
use crate::agent_engine::journal::{JournalEntry, StepJournal};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{AgentState, Goal, LoopState, RunSummary, StepOutcome};
use crate::config::{AgentConfig, ParseFailurePolicy};
use crate::errors::GridPilotResult;
use crate::executor::action::ActionResult;
use crate::executor::dispatcher::Executor;
use crate::llm::provider::Planner;
use crate::llm::tool_call::{is_termination_sentinel, parse_tool_call, sanitize, signature};
use crate::llm::types::PlanRequest;
use crate::perception::store::ScreenshotStore;
use crate::perception::traits::ScreenSource;

/// Runs perceive → plan → guard → execute → record until the goal is
/// reported done, a limit is hit, or a fatal error occurs.
pub struct AgentEngine {
    goal: Goal,
    config: AgentConfig,
    screen: Box<dyn ScreenSource>,
    planner: Box<dyn Planner>,
    executor: Executor,
    screenshots: Option<ScreenshotStore>,
    journal: Option<StepJournal>,
    state: AgentState,
}

impl AgentEngine {
    pub fn new(
        goal: Goal,
        config: AgentConfig,
        screen: Box<dyn ScreenSource>,
        planner: Box<dyn Planner>,
        executor: Executor,
    ) -> Self {
        Self {
            goal,
            config,
            screen,
            planner,
            executor,
            screenshots: None,
            journal: None,
            state: AgentState::Running,
        }
    }

    pub fn with_screenshots(mut self, store: ScreenshotStore) -> Self {
        self.screenshots = Some(store);
        self
    }

    pub fn with_journal(mut self, journal: StepJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub async fn run(&mut self) -> GridPilotResult<RunSummary> {
        let mut st = LoopState::new(self.config.history_window, self.config.max_repeat);
        let loop_ctrl = LoopController::new(&self.config);

        tracing::info!(goal = %self.goal, planner = self.planner.name(), "agent loop started");
        self.write_journal(JournalEntry::new(0, "goal").with_detail(self.goal.as_str()));
        self.set_state(AgentState::Running);

        loop {
            if let Some(reason) = loop_ctrl.should_stop(st.step + 1) {
                tracing::warn!(%reason, steps = st.step, "loop limit reached");
                self.set_state(AgentState::Terminated { success: false });
                self.write_journal(JournalEntry::new(st.step, "limit").with_detail(reason.to_string()));
                return Ok(summary(false, &st, reason.to_string()));
            }

            let outcome = match self.step(&mut st).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, step = st.step, "fatal error, stopping");
                    self.set_state(AgentState::Terminated { success: false });
                    self.write_journal(JournalEntry::new(st.step, "aborted").with_detail(e.to_string()));
                    return Err(e);
                }
            };

            match &outcome {
                StepOutcome::Finished => {
                    tracing::info!(step = st.step, "task completed");
                    self.set_state(AgentState::Terminated { success: true });
                    return Ok(summary(true, &st, "completion sentinel received".into()));
                }
                StepOutcome::TerminatedByAction(status) => {
                    tracing::info!(step = st.step, status = ?status, "execution terminated");
                    self.set_state(AgentState::Terminated { success: true });
                    let reason = match status {
                        Some(s) => format!("terminate action ({s})"),
                        None => "terminate action".into(),
                    };
                    return Ok(summary(true, &st, reason));
                }
                StepOutcome::PerceptionFailed(_) | StepOutcome::PlannerUnavailable => {
                    pause(self.config.retry_backoff()).await;
                }
                StepOutcome::Cooldown => {
                    self.set_state(AgentState::Cooldown);
                    pause(self.config.cooldown()).await;
                }
                StepOutcome::ParseFailed(_) => {
                    let delay = match self.config.on_parse_error {
                        ParseFailurePolicy::Retry => self.config.retry_backoff(),
                        _ => self.config.step_delay(),
                    };
                    pause(delay).await;
                }
                StepOutcome::ActionFailed(_) | StepOutcome::Executed(_) => {
                    pause(self.config.step_delay()).await;
                }
            }
        }
    }

    /// One pass through the loop. History and the repeat buffer live in `st`.
    pub async fn step(&mut self, st: &mut LoopState) -> GridPilotResult<StepOutcome> {
        st.step += 1;
        self.set_state(AgentState::Running);
        tracing::info!(step = st.step, "──────── step ────────");

        let (outcome, tool_call) = self.advance(st).await?;

        let mut entry = JournalEntry::new(st.step, outcome.label());
        if let Some(tc) = tool_call {
            entry = entry.with_tool_call(tc);
        }
        if let Some(detail) = outcome.detail() {
            entry = entry.with_detail(detail);
        }
        self.write_journal(entry);

        Ok(outcome)
    }

    async fn advance(&mut self, st: &mut LoopState) -> GridPilotResult<(StepOutcome, Option<String>)> {
        // ① Perception
        let artifact = match self.screen.capture().await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "screen capture failed, retrying");
                return Ok((StepOutcome::PerceptionFailed(e.to_string()), None));
            }
        };
        if let Some(store) = &self.screenshots {
            if let Err(e) = store.save(st.step, &artifact) {
                tracing::warn!(error = %e, "could not persist screenshot");
            }
        }

        // ② Planner with the bounded history window
        let request = PlanRequest {
            instruction: self.goal.as_str().to_string(),
            stage2_history: st.history.window(),
            image: artifact.image_base64,
        };
        let response = self.planner.act(&request).await;
        if !response.success {
            tracing::warn!("planner failed, retrying");
            return Ok((StepOutcome::PlannerUnavailable, None));
        }

        let tool_text = sanitize(&response.xml);
        tracing::info!(raw = %response.raw, "model output");
        tracing::info!(tool_call = %tool_text, "tool call");

        // ③ Completion sentinel
        if is_termination_sentinel(&tool_text) {
            return Ok((StepOutcome::Finished, Some(tool_text)));
        }

        // ④ Repeat protection
        if st.repeat_guard.observe(signature(&tool_text)) {
            tracing::warn!(max_repeat = self.config.max_repeat, "repeated action detected, cooling down");
            return Ok((StepOutcome::Cooldown, Some(tool_text)));
        }

        // ⑤ Parse
        let call = match parse_tool_call(&tool_text) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(error = %e, policy = ?self.config.on_parse_error, "tool call unparseable");
                match self.config.on_parse_error {
                    ParseFailurePolicy::Record => st.history.record_failure(),
                    ParseFailurePolicy::Retry => {}
                    ParseFailurePolicy::Abort => return Err(e.into()),
                }
                return Ok((StepOutcome::ParseFailed(e.to_string()), Some(tool_text)));
            }
        };

        // ⑥ Execute and record
        let outcome = match self.executor.run_tool_call(&call).await? {
            ActionResult::Continue => {
                let summary = extract_action_summary(&response.raw);
                tracing::info!(summary = %summary, "history updated");
                st.history.push(summary.clone());
                StepOutcome::Executed(summary)
            }
            ActionResult::Terminated { status } => StepOutcome::TerminatedByAction(status),
            ActionResult::Failed(failure) => {
                tracing::warn!(%failure, "execution error");
                st.history.record_failure();
                StepOutcome::ActionFailed(failure.to_string())
            }
        };
        Ok((outcome, Some(tool_text)))
    }

    fn set_state(&mut self, next: AgentState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }

    fn write_journal(&self, entry: JournalEntry) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&entry) {
                tracing::warn!(error = %e, "journal write failed");
            }
        }
    }
}

fn summary(success: bool, st: &LoopState, reason: String) -> RunSummary {
    RunSummary {
        success,
        steps: st.step,
        reason,
        history: st.history.entries().to_vec(),
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::agent_engine::history::FAILURE_MARKER;
    use crate::config::InputConfig;
    use crate::errors::GridPilotError;
    use crate::executor::coordinator::ScreenCoordinate;
    use crate::executor::dispatcher::testing::{Injected, RecordingDriver};
    use crate::executor::input::{InputError, MouseButton};
    use crate::llm::types::PlanResponse;
    use crate::perception::types::{ScreenArtifact, ScreenshotMeta};

    struct FakeScreen {
        captures: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl ScreenSource for FakeScreen {
        async fn capture(&self) -> GridPilotResult<ScreenArtifact> {
            let n = self.captures.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(GridPilotError::Perception("display asleep".into()));
            }
            Ok(ScreenArtifact {
                jpeg_bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
                image_base64: "/9j/2Q==".into(),
                meta: ScreenshotMeta {
                    physical_width: 1920,
                    physical_height: 1080,
                    encoded_width: 1024,
                    encoded_height: 576,
                },
            })
        }
    }

    struct ScriptedPlanner {
        script: Mutex<VecDeque<PlanResponse>>,
        requests: Arc<Mutex<Vec<PlanRequest>>>,
        fallback: PlanResponse,
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn act(&self, request: &PlanRequest) -> PlanResponse {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn tool(arguments: Value) -> String {
        format!(
            "<tool_call>{}</tool_call>",
            json!({"name": "computer_use", "arguments": arguments})
        )
    }

    fn ok(xml: impl Into<String>, raw: &str) -> PlanResponse {
        PlanResponse {
            success: true,
            xml: xml.into(),
            raw: raw.to_string(),
        }
    }

    fn quick_config() -> AgentConfig {
        AgentConfig {
            retry_backoff_ms: 0,
            cooldown_ms: 0,
            step_delay_ms: 0,
            ..AgentConfig::default()
        }
    }

    struct Harness {
        engine: AgentEngine,
        driver: RecordingDriver,
        requests: Arc<Mutex<Vec<PlanRequest>>>,
        captures: Arc<AtomicUsize>,
    }

    impl Harness {
        fn requests(&self) -> Vec<PlanRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn harness_with(
        config: AgentConfig,
        script: Vec<PlanResponse>,
        fallback: PlanResponse,
        driver: RecordingDriver,
        fail_first_captures: usize,
    ) -> Harness {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captures = Arc::new(AtomicUsize::new(0));
        let planner = ScriptedPlanner {
            script: Mutex::new(script.into()),
            requests: requests.clone(),
            fallback,
        };
        let screen = FakeScreen {
            captures: captures.clone(),
            fail_first: fail_first_captures,
        };
        let executor = Executor::new(Box::new(driver.clone()), &InputConfig::default());
        let engine = AgentEngine::new(
            Goal::new("Open notepad and type hello").unwrap(),
            config,
            Box::new(screen),
            Box::new(planner),
            executor,
        );
        Harness {
            engine,
            driver,
            requests,
            captures,
        }
    }

    fn harness(script: Vec<PlanResponse>) -> Harness {
        harness_with(
            quick_config(),
            script,
            ok("<terminate/>", ""),
            RecordingDriver::new(1920, 1080),
            0,
        )
    }

    #[tokio::test]
    async fn left_click_on_full_hd_then_sentinel() {
        let mut h = harness(vec![
            ok(
                r#"<tool_call>{"name":"computer_use","arguments":{"action":"left_click","coordinate":[500,500]}}</tool_call>"#,
                "Thought: the search box is centered.\nAction: Click the center of the screen.",
            ),
            ok("<terminate/>", ""),
        ]);

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.history, vec!["Click the center of the screen."]);
        assert_eq!(
            h.driver.events(),
            vec![Injected::Click(ScreenCoordinate { x: 960, y: 540 }, MouseButton::Left, 1)]
        );
        assert_eq!(h.engine.state(), &AgentState::Terminated { success: true });

        let requests = h.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].instruction, "Open notepad and type hello");
        assert_eq!(requests[0].stage2_history, "");
        assert_eq!(requests[0].image, "/9j/2Q==");
        assert_eq!(requests[1].stage2_history, "Click the center of the screen.");
    }

    #[tokio::test]
    async fn planner_failure_leaves_history_and_guard_untouched() {
        let click = tool(json!({"action": "left_click", "coordinate": [1, 1]}));
        let mut h = harness(vec![
            ok(click.clone(), "Action: first"),
            PlanResponse::unsuccessful(),
            ok(click.clone(), "Action: second"),
        ]);

        let summary = h.engine.run().await.unwrap();

        // The failed call never reaches the repeat buffer, so the second click
        // is seen as a direct repeat of the first.
        assert_eq!(summary.history, vec!["first"]);
        assert_eq!(h.driver.events().len(), 1);
        let requests = h.requests();
        assert_eq!(requests[1].stage2_history, "first");
        assert_eq!(requests[2].stage2_history, "first");
    }

    #[tokio::test]
    async fn fenced_sentinel_ends_run_regardless_of_raw() {
        let mut h = harness(vec![ok("```\n<BYE/>\n```", "Action: click something")]);

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.steps, 1);
        assert!(summary.history.is_empty());
        assert!(h.driver.events().is_empty());
    }

    #[tokio::test]
    async fn repeated_block_triggers_cooldown_without_execution() {
        let click = tool(json!({"action": "left_click", "coordinate": [100, 100]}));
        let typing = tool(json!({"action": "type", "text": "hello"}));
        let mut h = harness(vec![
            ok(click.clone(), "Action: click"),
            ok(click.clone(), "Action: click again"),
            ok(typing, "Action: type hello"),
        ]);

        let summary = h.engine.run().await.unwrap();

        assert_eq!(summary.history, vec!["click", "type hello"]);
        let events = h.driver.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Injected::Click(..)));
        assert!(matches!(events[1], Injected::Type(..)));
        assert_eq!(summary.steps, 4);
    }

    #[tokio::test]
    async fn executor_failure_is_recorded_and_loop_continues() {
        let mut h = harness(vec![
            ok(tool(json!({"action": "open_app", "name": "notepad"})), "Action: open notepad"),
            ok(tool(json!({"action": "type", "text": "hello"})), "Action: type hello"),
        ]);

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.history, vec![FAILURE_MARKER, "type hello"]);
        assert_eq!(h.requests()[1].stage2_history, FAILURE_MARKER);
    }

    #[tokio::test]
    async fn terminate_action_ends_run() {
        let mut h = harness(vec![ok(
            tool(json!({"action": "terminate", "status": "success"})),
            "Action: done",
        )]);

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.steps, 1);
        assert!(summary.reason.contains("success"));
        assert!(summary.history.is_empty());
    }

    #[tokio::test]
    async fn parse_failure_recorded_by_default() {
        let mut h = harness(vec![ok("<tool_call>{broken</tool_call>", "Action: oops")]);

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.history, vec![FAILURE_MARKER]);
    }

    #[tokio::test]
    async fn parse_failure_retry_policy_skips_history() {
        let config = AgentConfig {
            on_parse_error: ParseFailurePolicy::Retry,
            ..quick_config()
        };
        let mut h = harness_with(
            config,
            vec![ok(r#"<tool_call>{"name":"shell","arguments":{}}</tool_call>"#, "")],
            ok("<terminate/>", ""),
            RecordingDriver::new(1920, 1080),
            0,
        );

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert!(summary.history.is_empty());
    }

    #[tokio::test]
    async fn parse_failure_abort_policy_is_fatal() {
        let config = AgentConfig {
            on_parse_error: ParseFailurePolicy::Abort,
            ..quick_config()
        };
        let mut h = harness_with(
            config,
            vec![ok("no tool call at all", "")],
            ok("<terminate/>", ""),
            RecordingDriver::new(1920, 1080),
            0,
        );

        let result = h.engine.run().await;

        assert!(matches!(result, Err(GridPilotError::ToolCall(_))));
        assert_eq!(h.engine.state(), &AgentState::Terminated { success: false });
    }

    #[tokio::test]
    async fn step_limit_ends_unsuccessfully() {
        let config = AgentConfig {
            max_steps: Some(3),
            ..quick_config()
        };
        let mut h = harness_with(
            config,
            Vec::new(),
            PlanResponse::unsuccessful(),
            RecordingDriver::new(1920, 1080),
            0,
        );

        let summary = h.engine.run().await.unwrap();

        assert!(!summary.success);
        assert_eq!(summary.steps, 3);
        assert_eq!(h.requests().len(), 3);
        assert_eq!(h.engine.state(), &AgentState::Terminated { success: false });
    }

    #[tokio::test]
    async fn failsafe_aborts_the_run() {
        let mut driver = RecordingDriver::new(1920, 1080);
        driver.fail_with = Some(|| InputError::FailSafe);
        let mut h = harness_with(
            quick_config(),
            vec![ok(tool(json!({"action": "mouse_move", "coordinate": [0, 0]})), "")],
            ok("<terminate/>", ""),
            driver,
            0,
        );

        let result = h.engine.run().await;

        assert!(matches!(result, Err(GridPilotError::Aborted(_))));
    }

    #[tokio::test]
    async fn capture_failure_is_retried() {
        let mut h = harness_with(
            quick_config(),
            Vec::new(),
            ok("<terminate/>", ""),
            RecordingDriver::new(1920, 1080),
            2,
        );

        let summary = h.engine.run().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.steps, 3);
        assert_eq!(h.captures.load(Ordering::SeqCst), 3);
        assert_eq!(h.requests().len(), 1);
    }

    #[tokio::test]
    async fn history_window_sent_is_bounded() {
        let script = (1..=7)
            .map(|i| ok(tool(json!({"action": "type", "text": format!("t{i}")})), &format!("Action: typed {i}")))
            .collect();
        let mut h = harness(script);

        let summary = h.engine.run().await.unwrap();

        assert_eq!(summary.history.len(), 7);
        let last = h.requests().pop().unwrap();
        assert_eq!(last.stage2_history, "typed 3\ntyped 4\ntyped 5\ntyped 6\ntyped 7");
    }

    #[tokio::test]
    async fn journal_and_screenshots_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let h = harness(vec![ok(
            tool(json!({"action": "answer", "text": "42"})),
            "Action: answered",
        )]);
        let journal = StepJournal::new(Some(tmp.path().join("journal").as_path())).unwrap();
        let journal_path = journal.path().to_path_buf();
        let store = ScreenshotStore::open(&tmp.path().join("shots")).unwrap();
        let mut engine = h.engine.with_journal(journal).with_screenshots(store);

        engine.run().await.unwrap();

        let events: Vec<String> = std::fs::read_to_string(journal_path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<JournalEntry>(l).unwrap().event)
            .collect();
        assert_eq!(events, vec!["goal", "executed", "finished"]);
        assert!(tmp.path().join("shots").join("step_0001.jpg").exists());
        assert!(tmp.path().join("shots").join("step_0002.jpg").exists());
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SentinelConfig;
use crate::executor::SharedExecutor;
use crate::library::recording::{SessionCommand, SessionOutcome, SessionRecorder};
use crate::library::types::CommandKind;
use crate::library::{SharedLibrary, SharedVariables};
use crate::perception::traits::PerceptionProvider;
use crate::perception::types::TextFragment;
use crate::perception::wait::{wait_for_text, WaitConfig};
use crate::planner::planner::CommandPlanner;
use crate::planner::state::Instruction;
use crate::sentinel::anchor::AnchorRestorer;
use crate::sentinel::history::{DispatchHistory, DispatchRecord};
use crate::sentinel::trigger::{strip_markers, Trigger, TriggerDetector};
use crate::sentinel::watchdog::ActivityClock;

/// Collaborators the loop drives.
pub struct SentinelParts {
    pub perception: Arc<dyn PerceptionProvider>,
    pub planner: CommandPlanner,
    pub executor: SharedExecutor,
    pub library: SharedLibrary,
    pub variables: SharedVariables,
    pub recorder: SessionRecorder,
    pub anchor: AnchorRestorer,
    pub history: Option<DispatchHistory>,
    pub activity: ActivityClock,
}

/// What one cycle did with the marker it picked.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub marker_id: u64,
    pub goal: String,
    pub instruction: Instruction,
    pub success: bool,
}

/// Polls perception, picks at most one new marker per cycle and carries it
/// through planning and execution before looking at the screen again.
pub struct SentinelLoop {
    perception: Arc<dyn PerceptionProvider>,
    planner: CommandPlanner,
    executor: SharedExecutor,
    library: SharedLibrary,
    variables: SharedVariables,
    recorder: SessionRecorder,
    anchor: AnchorRestorer,
    history: Option<DispatchHistory>,
    activity: ActivityClock,
    detector: TriggerDetector,
    config: SentinelConfig,
    last_text: String,
    stop: Arc<AtomicBool>,
}

impl SentinelLoop {
    pub fn new(parts: SentinelParts, config: SentinelConfig) -> Self {
        Self {
            perception: parts.perception,
            planner: parts.planner,
            executor: parts.executor,
            library: parts.library,
            variables: parts.variables,
            recorder: parts.recorder,
            anchor: parts.anchor,
            history: parts.history,
            activity: parts.activity,
            detector: TriggerDetector::new(config.history_cycles),
            config,
            last_text: String::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the flag ends [`run`](Self::run) after the current cycle.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub async fn run(&mut self) {
        tracing::info!("sentinel active, scanning for markers already on screen");
        if let Some(d) = self.run_cycle().await {
            tracing::info!(marker_id = d.marker_id, success = d.success, "startup marker handled");
        }
        tracing::info!("startup scan complete, monitoring for new markers");

        let delay = Duration::from_millis(self.config.loop_delay_ms);
        while !self.stop.load(Ordering::Relaxed) {
            tokio::time::sleep(delay).await;
            self.run_cycle().await;
        }
        tracing::info!("sentinel stopped");
    }

    /// One capture and at most one dispatched marker.
    pub async fn run_cycle(&mut self) -> Option<Dispatch> {
        let observation = match self.perception.capture().await {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, "capture failed");
                return None;
            }
        };
        if observation.is_empty() {
            return None;
        }
        if observation.full_text != self.last_text {
            self.activity.touch();
            self.last_text = observation.full_text.clone();
        }

        self.variables.lock().await.parse_from_text(&observation.full_text);

        let trigger = self.detector.observe(&observation.full_text)?;
        self.activity.touch();
        let dispatch = self.dispatch(trigger, &observation.fragments).await;

        if let Some(history) = &self.history {
            let record = DispatchRecord::now(dispatch.marker_id, &dispatch.goal, &dispatch.instruction, dispatch.success);
            if let Err(e) = history.append(&record) {
                tracing::warn!(error = %e, "failed to write dispatch history");
            }
        }
        Some(dispatch)
    }

    async fn dispatch(&mut self, trigger: Trigger, fragments: &[TextFragment]) -> Dispatch {
        let Trigger { id, goal } = trigger;
        tracing::info!(marker_id = id, goal = %goal, "dispatching marker");

        if let Some(command) = SessionCommand::parse(&goal) {
            let success = self.handle_session(command).await;
            return Dispatch {
                marker_id: id,
                goal,
                instruction: Instruction::noop("session command"),
                success,
            };
        }

        let plan = self.planner.plan(&goal, fragments).await;
        let success = match &plan.instruction {
            Instruction::Run { kind } => self.execute(kind).await,
            Instruction::WaitForText { text } => {
                let wait = WaitConfig {
                    timeout: Duration::from_secs(self.config.wait_timeout_secs),
                    poll_interval: Duration::from_millis(self.config.wait_poll_ms),
                };
                wait_for_text(self.perception.as_ref(), text, &wait, strip_markers).await
            }
            Instruction::Batch { goals } => self.run_batch(goals).await,
            Instruction::Noop { reason } => {
                tracing::info!(reason = %reason, "nothing to do");
                false
            }
            Instruction::Failed { message } => {
                tracing::error!(message = %message, "planning failed");
                false
            }
        };

        if let (true, Instruction::Run { kind }) = (success, &plan.instruction) {
            self.restore_anchor(&goal).await;
            if self.recorder.is_recording() {
                self.recorder.record(&goal, kind);
            } else if let Some(kind) = plan.learnable() {
                self.library.lock().await.learn(&goal, kind.clone());
            }
        }

        Dispatch {
            marker_id: id,
            goal,
            instruction: plan.instruction,
            success,
        }
    }

    async fn execute(&self, kind: &CommandKind) -> bool {
        let executor = self.executor.lock().await;
        executor.execute(kind).await.success
    }

    async fn restore_anchor(&self, goal: &str) {
        if !self.anchor.is_enabled() {
            return;
        }
        let driver = self.executor.lock().await.driver();
        if let Err(e) = self.anchor.restore(driver.as_ref(), goal).await {
            tracing::warn!(error = %e, "focus restore failed");
        }
    }

    async fn handle_session(&mut self, command: SessionCommand) -> bool {
        if matches!(command, SessionCommand::Start(_)) {
            self.variables.lock().await.clear();
        }
        match self.recorder.handle(command) {
            Ok(SessionOutcome::Play(steps)) => {
                tracing::info!(steps = steps.len(), "replaying session");
                for step in steps {
                    if step.pause_secs > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(step.pause_secs)).await;
                    }
                    tracing::info!(goal = %step.goal, "replaying step");
                    self.execute(&step.instruction).await;
                }
                true
            }
            Ok(SessionOutcome::Unknown(name)) => {
                tracing::warn!(session = %name, "no such session");
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "session command failed");
                false
            }
        }
    }

    /// Writes the goals into a scratch document, then resolves and runs each
    /// one against a fresh capture. Nested loop directives are skipped.
    /// Succeeds when at least one step ran successfully.
    async fn run_batch(&mut self, goals: &[String]) -> bool {
        tracing::info!(count = goals.len(), editor = %self.config.scratch_editor, "starting batch");
        let driver = self.executor.lock().await.driver();

        if let Err(e) = driver.spawn_process(&[self.config.scratch_editor.clone()]) {
            tracing::error!(error = %e, "could not open scratch editor");
            return false;
        }
        tokio::time::sleep(Duration::from_millis(self.config.scratch_open_delay_ms)).await;
        for goal in goals {
            if let Err(e) = driver.type_text(&format!("{goal}\n")) {
                tracing::warn!(error = %e, "could not write batch line");
            }
        }

        let mut completed = 0usize;
        for (idx, goal) in goals.iter().enumerate() {
            tracing::info!(step = idx + 1, total = goals.len(), goal = %goal, "batch step");
            let fragments = match self.perception.capture().await {
                Ok(o) => o.fragments,
                Err(e) => {
                    tracing::warn!(error = %e, "capture failed during batch");
                    Vec::new()
                }
            };
            let plan = self.planner.plan(goal, &fragments).await;
            match &plan.instruction {
                Instruction::Run { kind } => {
                    if self.execute(kind).await {
                        completed += 1;
                        self.restore_anchor(goal).await;
                    }
                }
                other => tracing::info!(kind = other.label(), "batch step skipped"),
            }
        }
        tracing::info!(completed, total = goals.len(), "batch finished");
        completed > 0
    }
}

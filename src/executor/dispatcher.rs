use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ExecutorConfig, SafetyConfig};
use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::executor::input::DesktopDriver;
use crate::executor::safety;
use crate::executor::script::{parse_script, ScriptStep};
use crate::library::types::CommandKind;
use crate::library::SharedLibrary;

/// Sequences may reference other sequences; this bounds accidental cycles.
const MAX_SEQUENCE_DEPTH: usize = 8;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    /// Zero-based position in the sequence.
    pub step: usize,
    pub entry_id: u32,
    pub error: String,
}

/// Outcome of one dispatch. Execution never raises; failures land here.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub step_failures: Vec<StepFailure>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn ok(output: Option<String>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            step_failures: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            step_failures: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

impl From<TrigWatchResult<Option<String>>> for ExecutionReport {
    fn from(result: TrigWatchResult<Option<String>>) -> Self {
        match result {
            Ok(output) => ExecutionReport::ok(output),
            Err(e) => ExecutionReport::failed(e.to_string()),
        }
    }
}

/// Runs resolved command kinds against the desktop.
pub struct ActionExecutor {
    library: SharedLibrary,
    driver: Arc<dyn DesktopDriver>,
    config: ExecutorConfig,
    safety: SafetyConfig,
}

impl ActionExecutor {
    pub fn new(library: SharedLibrary, driver: Arc<dyn DesktopDriver>, config: ExecutorConfig, safety: SafetyConfig) -> Self {
        Self {
            library,
            driver,
            config,
            safety,
        }
    }

    pub fn driver(&self) -> Arc<dyn DesktopDriver> {
        Arc::clone(&self.driver)
    }

    pub async fn execute(&self, kind: &CommandKind) -> ExecutionReport {
        tracing::info!(kind = kind.label(), "executing command");
        let report = self.dispatch(kind, 0).await;
        if report.success {
            tracing::info!(
                kind = kind.label(),
                output = report.output.as_deref().unwrap_or(""),
                step_failures = report.step_failures.len(),
                "command finished"
            );
        } else {
            tracing::warn!(
                kind = kind.label(),
                error = report.error.as_deref().unwrap_or(""),
                "command failed"
            );
        }
        report
    }

    /// Looks up a library entry by id and executes it.
    pub async fn execute_entry(&self, id: u32) -> ExecutionReport {
        let kind = {
            let library = self.library.lock().await;
            library.get_by_id(id).map(|e| e.kind.clone())
        };
        match kind {
            Some(kind) => self.execute(&kind).await,
            None => ExecutionReport::failed(format!("command id {id} not found")),
        }
    }

    fn dispatch<'a>(&'a self, kind: &'a CommandKind, depth: usize) -> BoxFuture<'a, ExecutionReport> {
        Box::pin(async move {
            if let Err(e) = safety::check(kind, &self.safety) {
                return ExecutionReport::failed(e.to_string());
            }

            match kind {
                CommandKind::Script { code } => self.run_script(code).await.into(),
                CommandKind::Shell { command } => self.run_shell(command).await,
                CommandKind::Hotkey { keys } => {
                    if keys.is_empty() {
                        ExecutionReport::failed("no keys specified")
                    } else {
                        self.driver.press_combo(keys).map(|_| None::<String>).into()
                    }
                }
                CommandKind::Sequence { steps, delay_ms } => self.run_sequence(steps, *delay_ms, depth).await,
                CommandKind::Url { url } => {
                    if url.trim().is_empty() {
                        ExecutionReport::failed("empty url")
                    } else {
                        self.driver.open_url(url.trim()).map(|_| None::<String>).into()
                    }
                }
                CommandKind::File { path } => {
                    if path.trim().is_empty() {
                        ExecutionReport::failed("empty path")
                    } else {
                        self.driver.open_file(path.trim()).map(|_| None::<String>).into()
                    }
                }
                CommandKind::Unsupported => ExecutionReport::failed("unknown command type"),
            }
        })
    }

    async fn run_script(&self, code: &str) -> TrigWatchResult<Option<String>> {
        let steps = parse_script(code)?;
        let mut echoed = Vec::new();

        for step in steps {
            match step {
                ScriptStep::Type(text) => self.driver.type_text(&text)?,
                ScriptStep::Press(key) => self.driver.press_combo(&[key])?,
                ScriptStep::Hotkey(keys) => self.driver.press_combo(&keys)?,
                ScriptStep::Click { x, y, kind } => self.driver.click(x, y, kind)?,
                ScriptStep::Move { x, y } => self.driver.move_mouse(x, y)?,
                ScriptStep::Spawn(cmdline) => {
                    let mut argv = self.config.shell_argv();
                    argv.push(cmdline);
                    self.driver.spawn_process(&argv)?;
                }
                ScriptStep::Sleep(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                ScriptStep::OpenUrl(url) => self.driver.open_url(&url)?,
                ScriptStep::OpenFile(path) => self.driver.open_file(&path)?,
                ScriptStep::Echo(text) => echoed.push(text),
                ScriptStep::WaitForText(_) | ScriptStep::Batch(_) => {
                    return Err(TrigWatchError::Executor(
                        "wait_for_text and batch are handled by the watch loop".into(),
                    ));
                }
            }
        }

        Ok(if echoed.is_empty() { None } else { Some(echoed.join("\n")) })
    }

    async fn run_shell(&self, command: &str) -> ExecutionReport {
        let argv = self.config.shell_argv();
        let Some((program, args)) = argv.split_first() else {
            return ExecutionReport::failed("no shell configured");
        };

        let output = tokio::process::Command::new(program)
            .args(args)
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => return ExecutionReport::failed(format!("failed to start shell: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stdout.is_empty() {
            tracing::debug!(%stdout, "shell stdout");
        }
        if !stderr.is_empty() {
            tracing::debug!(%stderr, "shell stderr");
        }

        if output.status.success() {
            ExecutionReport::ok(Some(stdout).filter(|s| !s.is_empty()))
        } else {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into());
            let mut report = ExecutionReport::failed(format!("exit code {code}: {stderr}"));
            report.output = Some(stdout).filter(|s| !s.is_empty());
            report
        }
    }

    async fn run_sequence(&self, steps: &[u32], delay_ms: Option<u64>, depth: usize) -> ExecutionReport {
        if steps.is_empty() {
            return ExecutionReport::failed("sequence has no steps");
        }
        if depth >= MAX_SEQUENCE_DEPTH {
            return ExecutionReport::failed("sequence nesting too deep");
        }

        let delay = Duration::from_millis(delay_ms.unwrap_or(self.config.sequence_delay_ms));
        let mut failures = Vec::new();

        for (idx, &id) in steps.iter().enumerate() {
            let kind = {
                let library = self.library.lock().await;
                library.get_by_id(id).map(|e| e.kind.clone())
            };

            match kind {
                Some(kind) => {
                    tracing::debug!(step = idx, id, kind = kind.label(), "running sequence step");
                    let report = self.dispatch(&kind, depth + 1).await;
                    if !report.success {
                        failures.push(StepFailure {
                            step: idx,
                            entry_id: id,
                            error: report.error.unwrap_or_default(),
                        });
                    }
                }
                None => failures.push(StepFailure {
                    step: idx,
                    entry_id: id,
                    error: format!("command id {id} not found"),
                }),
            }

            if idx + 1 < steps.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        for f in &failures {
            tracing::warn!(step = f.step, id = f.entry_id, error = %f.error, "sequence step failed");
        }

        let mut report = ExecutionReport::ok(Some(format!(
            "sequence complete ({} steps, {} failed)",
            steps.len(),
            failures.len()
        )));
        report.step_failures = failures;
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::executor::input::ClickKind;
    use crate::library::store::CommandLibrary;
    use crate::library::types::CommandEntry;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    /// Records every desktop call as a readable string.
    #[derive(Default)]
    pub struct RecordingDriver {
        pub calls: StdMutex<Vec<String>>,
        pub fail_keys: bool,
    }

    impl RecordingDriver {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl DesktopDriver for RecordingDriver {
        fn press_combo(&self, keys: &[String]) -> TrigWatchResult<()> {
            if self.fail_keys {
                return Err(TrigWatchError::Executor("keyboard unplugged".into()));
            }
            self.push(format!("keys {}", keys.join("+")));
            Ok(())
        }

        fn click(&self, x: i32, y: i32, kind: ClickKind) -> TrigWatchResult<()> {
            self.push(format!("{} {x} {y}", kind.verb()));
            Ok(())
        }

        fn move_mouse(&self, x: i32, y: i32) -> TrigWatchResult<()> {
            self.push(format!("move {x} {y}"));
            Ok(())
        }

        fn type_text(&self, text: &str) -> TrigWatchResult<()> {
            self.push(format!("type {text}"));
            Ok(())
        }

        fn spawn_process(&self, argv: &[String]) -> TrigWatchResult<()> {
            self.push(format!("spawn {}", argv.last().cloned().unwrap_or_default()));
            Ok(())
        }

        fn open_url(&self, url: &str) -> TrigWatchResult<()> {
            self.push(format!("url {url}"));
            Ok(())
        }

        fn open_file(&self, path: &str) -> TrigWatchResult<()> {
            self.push(format!("file {path}"));
            Ok(())
        }

        fn screen_size(&self) -> TrigWatchResult<(i32, i32)> {
            Ok((1920, 1080))
        }
    }

    fn executor_with(entries: Vec<CommandEntry>, driver: Arc<RecordingDriver>) -> ActionExecutor {
        let mut library = CommandLibrary::in_memory();
        for entry in entries {
            library.insert(entry).unwrap();
        }
        let config = ExecutorConfig {
            sequence_delay_ms: 0,
            ..ExecutorConfig::default()
        };
        ActionExecutor::new(Arc::new(Mutex::new(library)), driver, config, SafetyConfig::default())
    }

    #[tokio::test]
    async fn script_drives_the_desktop() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver.clone());
        let kind = CommandKind::Script {
            code: "# greet\ntype \"hi there\"\npress enter\nclick 5 6\necho done".into(),
        };
        let report = exec.execute(&kind).await;
        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.output.as_deref(), Some("done"));
        assert_eq!(driver.calls(), vec!["type hi there", "keys enter", "click 5 6"]);
    }

    #[tokio::test]
    async fn script_spawn_goes_through_the_shell() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver.clone());
        let report = exec.execute(&CommandKind::Script { code: "spawn \"notepad\"".into() }).await;
        assert!(report.success);
        assert_eq!(driver.calls(), vec!["spawn notepad"]);
    }

    #[tokio::test]
    async fn script_errors_are_reported_not_raised() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver.clone());
        let report = exec.execute(&CommandKind::Script { code: "type \"a\"\nfly away".into() }).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("line 2"));
    }

    #[tokio::test]
    async fn empty_hotkey_fails() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver.clone());
        let report = exec.execute(&CommandKind::Hotkey { keys: vec![] }).await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("no keys specified"));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn sequence_continues_past_failed_steps() {
        let driver = Arc::new(RecordingDriver {
            fail_keys: true,
            ..RecordingDriver::default()
        });
        let exec = executor_with(
            vec![
                CommandEntry::new("say hi", 501, CommandKind::Script { code: "type \"hi\"".into() }),
                CommandEntry::new("copy", 502, CommandKind::Hotkey { keys: vec!["ctrl".into(), "c".into()] }),
                CommandEntry::new("both", 503, CommandKind::Sequence { steps: vec![501, 502, 999], delay_ms: Some(0) }),
            ],
            driver.clone(),
        );

        let report = exec.execute_entry(503).await;
        assert!(report.success);
        assert_eq!(report.step_failures.len(), 2);
        assert_eq!(report.step_failures[0].entry_id, 502);
        assert!(report.step_failures[0].error.contains("keyboard unplugged"));
        assert_eq!(report.step_failures[1].entry_id, 999);
        assert_eq!(driver.calls(), vec!["type hi"]);
    }

    #[tokio::test]
    async fn empty_and_self_referencing_sequences_fail() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(
            vec![CommandEntry::new("loop", 600, CommandKind::Sequence { steps: vec![600], delay_ms: Some(0) })],
            driver,
        );
        assert!(!exec.execute(&CommandKind::Sequence { steps: vec![], delay_ms: None }).await.success);

        // Terminates at the nesting cap instead of recursing forever.
        let report = exec.execute_entry(600).await;
        assert!(report.success);
    }

    #[tokio::test]
    async fn missing_entry_and_unknown_type_fail() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver);
        assert!(!exec.execute_entry(4242).await.success);
        let report = exec.execute(&CommandKind::Unsupported).await;
        assert_eq!(report.error.as_deref(), Some("unknown command type"));
    }

    #[tokio::test]
    async fn url_and_file_use_the_driver() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver.clone());
        assert!(exec.execute(&CommandKind::Url { url: "https://example.com".into() }).await.success);
        assert!(exec.execute(&CommandKind::File { path: "/tmp/x.txt".into() }).await.success);
        assert!(!exec.execute(&CommandKind::Url { url: " ".into() }).await.success);
        assert_eq!(driver.calls(), vec!["url https://example.com", "file /tmp/x.txt"]);
    }

    #[tokio::test]
    async fn pseudo_instructions_are_not_executable() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver);
        let report = exec.execute(&CommandKind::Script { code: "wait_for_text \"Done\"".into() }).await;
        assert!(!report.success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_reports_exit_status_and_output() {
        let driver = Arc::new(RecordingDriver::default());
        let exec = executor_with(vec![], driver);

        let ok = exec.execute(&CommandKind::Shell { command: "echo hello".into() }).await;
        assert!(ok.success);
        assert_eq!(ok.output.as_deref(), Some("hello"));

        let bad = exec.execute(&CommandKind::Shell { command: "echo oops >&2; exit 3".into() }).await;
        assert!(!bad.success);
        let err = bad.error.unwrap();
        assert!(err.contains("exit code 3"), "{err}");
        assert!(err.contains("oops"), "{err}");
    }

    #[tokio::test]
    async fn safety_blocks_shell_when_disabled() {
        let driver = Arc::new(RecordingDriver::default());
        let mut exec = executor_with(vec![], driver);
        exec.safety.allow_shell = false;
        let report = exec.execute(&CommandKind::Shell { command: "echo hi".into() }).await;
        assert!(!report.success);
        assert!(report.error.unwrap().contains("Safety violation"));
    }
}

pub mod config;
pub mod errors;
pub mod executor;
pub mod library;
pub mod llm;
pub mod perception;
pub mod planner;
pub mod sentinel;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::errors::TrigWatchResult;
use crate::executor::dispatcher::ActionExecutor;
use crate::executor::input::SystemDesktop;
use crate::library::recording::SessionRecorder;
use crate::library::store::CommandLibrary;
use crate::library::variables::VariableStore;
use crate::llm::registry::ProviderRegistry;
use crate::perception::command_feed::CommandFeed;
use crate::perception::window_focus::platform_window_service;
use crate::planner::planner::CommandPlanner;
use crate::sentinel::anchor::AnchorRestorer;
use crate::sentinel::engine::{SentinelLoop, SentinelParts};
use crate::sentinel::history::DispatchHistory;
use crate::sentinel::watchdog::{ActivityClock, IdleWatchdog};

/// Command-line values that take precedence over `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub library_path: Option<PathBuf>,
    pub anchor: Option<String>,
    pub idle_timeout_secs: Option<u64>,
    pub perception_command: Option<String>,
}

impl RunOptions {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.library_path {
            config.library.path = path.clone();
        }
        if let Some(anchor) = &self.anchor {
            config.anchor.target = anchor.clone();
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.watchdog.idle_timeout_secs = secs;
        }
        if let Some(command) = &self.perception_command {
            config.perception.command = command.clone();
        }
    }
}

/// Wires every component together and watches until Ctrl-C.
pub async fn run(options: RunOptions) -> TrigWatchResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let mut config = match (&options.config_path, config::load_config(options.config_path.as_deref())) {
        (_, Ok(cfg)) => cfg,
        (Some(_), Err(e)) => return Err(e),
        (None, Err(e)) => {
            tracing::warn!(error = %e, "no usable config; running with defaults");
            AppConfig::default()
        }
    };
    options.apply(&mut config);

    let perception = Arc::new(CommandFeed::from_config(&config.perception)?);
    let registry = Arc::new(ProviderRegistry::from_config(&config));
    tracing::info!(providers = ?registry.list_names(), active = %config.llm.active_provider, "llm providers ready");

    let library = Arc::new(Mutex::new(CommandLibrary::open(&config.library.path)));
    let variables = Arc::new(Mutex::new(VariableStore::new()));
    let recorder = SessionRecorder::open(&config.library.sessions_path);

    let executor = Arc::new(Mutex::new(ActionExecutor::new(
        library.clone(),
        Arc::new(SystemDesktop::new()),
        config.executor.clone(),
        config.safety.clone(),
    )));
    let planner = CommandPlanner::new(library.clone(), variables.clone(), registry, config.planner.clone());
    let anchor = AnchorRestorer::new(config.anchor.clone(), platform_window_service());
    let history = config.sentinel.record_history.then(DispatchHistory::new);
    if let Some(h) = &history {
        tracing::info!(path = %h.path().display(), "dispatch history enabled");
    }
    let activity = ActivityClock::new();

    let mut sentinel = SentinelLoop::new(
        SentinelParts {
            perception,
            planner,
            executor: executor.clone(),
            library,
            variables,
            recorder,
            anchor,
            history,
            activity: activity.clone(),
        },
        config.sentinel.clone(),
    );
    let stop = sentinel.stop_flag();

    let watchdog = IdleWatchdog::new(executor, activity, config.watchdog.clone(), stop.clone()).spawn();

    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            ctrl_c_stop.store(true, Ordering::Relaxed);
        }
    });

    sentinel.run().await;

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = watchdog {
        let _ = handle.await;
    }
    Ok(())
}

pub mod dispatcher;
pub mod input;
pub mod safety;
pub mod script;

use std::sync::Arc;

use tokio::sync::Mutex;

/// Dispatch is serialized between the watch loop and the idle watchdog.
pub type SharedExecutor = Arc<Mutex<dispatcher::ActionExecutor>>;

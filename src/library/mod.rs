pub mod recording;
pub mod store;
pub mod types;
pub mod variables;

use std::sync::Arc;

use tokio::sync::Mutex;

pub type SharedLibrary = Arc<Mutex<store::CommandLibrary>>;
pub type SharedVariables = Arc<Mutex<variables::VariableStore>>;

pub mod anchor;
pub mod engine;
pub mod history;
pub mod trigger;
pub mod watchdog;

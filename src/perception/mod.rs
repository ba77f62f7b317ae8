pub mod command_feed;
pub mod traits;
pub mod types;
pub mod wait;
pub mod window_focus;

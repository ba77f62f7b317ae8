pub mod aim;
pub mod inject;
pub mod inline;
pub mod keywords;
pub mod parse;
#[allow(clippy::module_inception)]
pub mod planner;
pub mod state;

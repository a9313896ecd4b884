pub mod add;
pub mod common;
pub mod completions;
pub mod export;
pub mod list;
pub mod log;
pub mod new_id;
pub mod studies;
pub mod update;

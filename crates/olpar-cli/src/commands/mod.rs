pub mod common;
pub mod completions;
pub mod export;
pub mod records;
pub mod session;
pub mod status;
pub mod users;
pub mod watch;

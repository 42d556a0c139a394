//! Application wiring and lifecycle management.

mod init;
mod lifecycle;
mod rollover;

pub use init::run_mirror;
pub use lifecycle::{check_status, show_history, start_mirror, stop_mirror};

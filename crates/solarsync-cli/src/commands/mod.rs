//! Command implementations for the CLI.

mod export;
mod latest;
mod logs;
mod update;

pub use export::cmd_export;
pub use latest::cmd_latest;
pub use logs::cmd_logs;
pub use update::cmd_update;

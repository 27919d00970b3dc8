//! CLI command handlers. Each command is in its own file for clarity.

mod account;
mod add;
mod cancel;
mod reconnect;
mod remove;
mod run;
mod set_config;
mod status;

pub use account::{run_account_add, run_account_list};
pub use add::run_add;
pub use cancel::run_cancel;
pub use reconnect::run_reconnect_cmd;
pub use remove::run_remove;
pub use run::run_pool;
pub use set_config::run_set_config;
pub use status::run_status;

pub mod config;
pub mod logging;

pub mod accounts;
pub mod addons;
pub mod captcha;
pub mod control;
pub mod events;
pub mod executor;
pub mod jobs;
pub mod naming;
pub mod periodical;
pub mod pool;
pub mod reconnect;
pub mod registry;
pub mod remote;
pub mod retry;

//! `dlhost reconnect` – run the configured reconnect script. Goes through a
//! live host's remote socket when one is serving, so downloads pause around
//! the reconnect; otherwise runs the script directly.

use anyhow::{bail, Result};
use dlhost_core::config::HostConfig;
use dlhost_core::events::EventBus;
use dlhost_core::reconnect::run_reconnect;
use dlhost_core::remote::{self, ApiRequest, ApiResponse};

pub async fn run_reconnect_cmd(cfg: &HostConfig) -> Result<()> {
    if let Ok(path) = remote::default_socket_path() {
        match remote::send_request(&path, &ApiRequest::Reconnect).await {
            Ok(ApiResponse::Ok) => {
                println!("Reconnect done.");
                return Ok(());
            }
            Ok(ApiResponse::Error { message }) => bail!("reconnect: {message}"),
            _ => {}
        }
    }

    let Some(script) = &cfg.reconnect_script else {
        bail!("no reconnect_script configured");
    };
    let script = script.clone();
    let bus = std::sync::Arc::new(EventBus::new());
    tokio::task::spawn_blocking(move || run_reconnect(&script, &bus))
        .await
        .map_err(|e| anyhow::anyhow!("reconnect task join: {e}"))??;
    println!("Reconnect done.");
    Ok(())
}

//! `dlhost set-config <key> <value>` – change a config value. A live host
//! picks it up through the remote socket; otherwise the file is updated for
//! the next run.

use anyhow::{bail, Result};
use dlhost_core::config::{self, HostConfig};
use dlhost_core::remote::{self, ApiRequest, ApiResponse};

pub async fn run_set_config(mut cfg: HostConfig, key: &str, value: &str) -> Result<()> {
    if let Ok(path) = remote::default_socket_path() {
        let request = ApiRequest::SetConfig {
            key: key.to_string(),
            value: value.to_string(),
        };
        match remote::send_request(&path, &request).await {
            Ok(ApiResponse::Ok) => {
                println!("Set {key} = {value}");
                return Ok(());
            }
            Ok(ApiResponse::Error { message }) => bail!("set-config: {message}"),
            _ => {}
        }
    }

    cfg.apply(key, value)?;
    config::save(&cfg)?;
    println!("Set {key} = {value}");
    Ok(())
}

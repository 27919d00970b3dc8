//! `dlhost pause <id>` / `dlhost cancel <id>` – stop a job. If `dlhost run`
//! is active its remote socket gets the request; otherwise the store is
//! updated directly.

use anyhow::Result;
use dlhost_core::jobs::JobStore;
use dlhost_core::remote::{self, ApiRequest, ApiResponse};

pub async fn run_cancel(store: &JobStore, id: i64, pause: bool) -> Result<()> {
    let verb = if pause { "Paused" } else { "Cancelled" };

    if let Ok(path) = remote::default_socket_path() {
        let request = if pause {
            ApiRequest::Pause { job: id }
        } else {
            ApiRequest::Cancel { job: id }
        };
        if let Ok(ApiResponse::Ok) = remote::send_request(&path, &request).await {
            println!("{verb} job {id}");
            return Ok(());
        }
    }

    if store.mark_cancelled(id).await? {
        println!("{verb} job {id}");
    } else {
        println!("Job {id} is not queued or running.");
    }
    Ok(())
}

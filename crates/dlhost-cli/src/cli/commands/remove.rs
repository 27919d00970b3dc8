//! `dlhost remove <package>` – delete a package and its jobs.

use anyhow::Result;
use dlhost_core::events::EventBus;
use dlhost_core::jobs::JobStore;
use dlhost_core::remote::{self, ApiRequest, ApiResponse};

pub async fn run_remove(store: &JobStore, package: i64) -> Result<()> {
    if let Ok(path) = remote::default_socket_path() {
        let request = ApiRequest::DeletePackage { package };
        if let Ok(ApiResponse::Ok) = remote::send_request(&path, &request).await {
            println!("Removed package {package}");
            return Ok(());
        }
    }

    let bus = EventBus::new();
    if store.delete_package(package, &bus).await? {
        println!("Removed package {package}");
    } else {
        println!("No such package: {package}");
    }
    Ok(())
}

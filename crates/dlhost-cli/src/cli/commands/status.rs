//! `dlhost status` – show all packages and their jobs.

use anyhow::Result;
use dlhost_core::jobs::JobStore;

pub async fn run_status(store: &JobStore) -> Result<()> {
    let packages = store.list_packages().await?;
    if packages.is_empty() {
        println!("No packages in database.");
        return Ok(());
    }

    for pkg in packages {
        println!("package {} ({})", pkg.id, pkg.name);
        for j in store.package_jobs(pkg.id).await? {
            let file = j.filename.as_deref().unwrap_or("-");
            println!(
                "  {:<6} {:<10} {:<30} {}",
                j.id,
                j.status.as_str(),
                file,
                j.url
            );
            if let Some(err) = &j.error {
                println!("         error: {err}");
            }
        }
    }
    Ok(())
}

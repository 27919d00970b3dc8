//! `dlhost account add|list` – manage hoster credentials.

use anyhow::Result;
use dlhost_core::accounts::{accounts_path, list_accounts, upsert_account};

pub fn run_account_add(service: &str, login: &str, secret: &str) -> Result<()> {
    upsert_account(&accounts_path()?, service, login, secret)?;
    println!("Stored account for {service} ({login})");
    Ok(())
}

pub fn run_account_list() -> Result<()> {
    let accounts = list_accounts(&accounts_path()?)?;
    if accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }
    println!("{:<24} {}", "SERVICE", "LOGIN");
    for a in accounts {
        println!("{:<24} {}", a.service, a.login);
    }
    Ok(())
}

//! Account credential file: `~/.config/dlhost/accounts.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{AccountApi, AccountInfo, AccountStore, AuthError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default, rename = "account")]
    accounts: Vec<AccountCred>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountCred {
    pub service: String,
    pub login: String,
    pub secret: String,
}

pub fn accounts_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlhost")?;
    Ok(xdg_dirs.place_config_file("accounts.toml")?)
}

fn read_file(path: &Path) -> Result<AccountsFile> {
    if !path.exists() {
        return Ok(AccountsFile::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&data).context("invalid accounts file")
}

/// Add or replace the account for a service in the credential file.
pub fn upsert_account(path: &Path, service: &str, login: &str, secret: &str) -> Result<()> {
    let mut file = read_file(path)?;
    file.accounts.retain(|a| a.service != service);
    file.accounts.push(AccountCred {
        service: service.to_string(),
        login: login.to_string(),
        secret: secret.to_string(),
    });
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(&file)?)?;
    Ok(())
}

/// Accounts in the credential file (secrets included; callers redact).
pub fn list_accounts(path: &Path) -> Result<Vec<AccountCred>> {
    Ok(read_file(path)?.accounts)
}

/// Load every stored credential into the store.
pub fn load_into(path: &Path, store: &AccountStore) -> Result<usize> {
    let file = read_file(path)?;
    for cred in &file.accounts {
        store.set_account(&cred.service, &cred.login, &cred.secret);
    }
    Ok(file.accounts.len())
}

/// Default upstream seam for services without a dedicated account plugin:
/// the stored secret is the service-issued long session token, handed out
/// with a 24h validity window. A dedicated plugin would perform a real login
/// here instead.
pub struct StoredSessionApi;

impl AccountApi for StoredSessionApi {
    fn fetch_account_info(
        &self,
        service: &str,
        login: &str,
        secret: &str,
    ) -> Result<AccountInfo, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Rejected {
                service: service.to_string(),
                login: login.to_string(),
                reason: "empty session token".to_string(),
            });
        }
        Ok(AccountInfo {
            session: secret.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(24 * 3600),
            premium: true,
        })
    }
}

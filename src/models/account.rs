//! Account credentials and the account-list loader.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Proxy settings attached to one account.
///
/// Field names follow the `accounts.json` layout (`proxyAxios`, ...), so
/// existing account files load unchanged.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Route the account's API traffic through the proxy as well.
    pub proxy_axios: bool,
    /// Proxy host or URL; empty means "no proxy".
    pub url: String,
    /// Proxy port.
    pub port: u16,
    /// Proxy user name.
    pub username: String,
    /// Proxy password.
    pub password: String,
}

impl ProxyConfig {
    /// Whether a proxy endpoint is configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl Debug for ProxyConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("proxy_axios", &self.proxy_axios)
            .field("url", &self.url)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One account's credentials. Immutable for the lifetime of a run.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountCredential {
    /// Account e-mail, also used as the account identifier in logs.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Proxy used for every session of this account.
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Debug for AccountCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Load the ordered account list from a JSON file.
///
/// # Errors
///
/// Returns `AppError::Accounts` if the file cannot be read, is not a JSON
/// array of accounts, is empty, or lists the same e-mail twice.
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountCredential>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::Accounts(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_accounts(&raw)
}

/// Parse and validate an account list from its JSON text.
///
/// # Errors
///
/// Returns `AppError::Accounts` on malformed JSON, an empty list, blank
/// credentials, or duplicate e-mails.
pub fn parse_accounts(raw: &str) -> Result<Vec<AccountCredential>> {
    let accounts: Vec<AccountCredential> = serde_json::from_str(raw)
        .map_err(|err| AppError::Accounts(format!("invalid account list: {err}")))?;

    if accounts.is_empty() {
        return Err(AppError::Accounts("account list is empty".into()));
    }

    let mut seen = HashSet::new();
    for account in &accounts {
        if account.email.trim().is_empty() || account.password.is_empty() {
            return Err(AppError::Accounts(
                "every account needs an email and a password".into(),
            ));
        }
        if !seen.insert(account.email.to_lowercase()) {
            return Err(AppError::Accounts(format!(
                "duplicate account {}",
                account.email
            )));
        }
    }

    Ok(accounts)
}

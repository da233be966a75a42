//! Per-account networking context.
//!
//! Built once per account from its [`ProxyConfig`] and shared read-only
//! (behind an `Arc`) by the desktop and mobile persona-runs of that
//! account. Never mutated after construction.

use std::fmt::{Debug, Formatter};

use serde::Serialize;

use crate::models::account::ProxyConfig;

/// Proxy routing handed to every collaborator call of one account.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct NetworkContext {
    /// Account the context was built for.
    pub account: String,
    /// Proxy endpoint (`scheme://[user:pass@]host:port`), if any.
    pub proxy_url: Option<String>,
    /// Route API traffic (not just the browser) through the proxy.
    pub proxy_api_traffic: bool,
}

impl NetworkContext {
    /// Build the context for one account.
    #[must_use]
    pub fn for_account(account: &str, proxy: &ProxyConfig) -> Self {
        Self {
            account: account.to_owned(),
            proxy_url: proxy_url(proxy),
            proxy_api_traffic: proxy.is_configured() && proxy.proxy_axios,
        }
    }

    /// Whether traffic for this account goes through a proxy.
    #[must_use]
    pub fn is_proxied(&self) -> bool {
        self.proxy_url.is_some()
    }
}

impl Debug for NetworkContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContext")
            .field("account", &self.account)
            .field("proxied", &self.is_proxied())
            .field("proxy_api_traffic", &self.proxy_api_traffic)
            .finish()
    }
}

fn proxy_url(proxy: &ProxyConfig) -> Option<String> {
    if !proxy.is_configured() {
        return None;
    }

    let raw = proxy.url.trim();
    let (scheme, host) = raw
        .split_once("://")
        .map_or(("http", raw), |(scheme, host)| (scheme, host));
    let host = host.trim_end_matches('/');

    let auth = if proxy.username.is_empty() {
        String::new()
    } else {
        format!("{}:{}@", proxy.username, proxy.password)
    };

    Some(if proxy.port == 0 {
        format!("{scheme}://{auth}{host}")
    } else {
        format!("{scheme}://{auth}{host}:{}", proxy.port)
    })
}

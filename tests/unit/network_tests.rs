//! Unit tests for the per-account network context.

use rewards_runner::models::account::ProxyConfig;
use rewards_runner::network::NetworkContext;

fn proxy(url: &str, port: u16, username: &str, password: &str) -> ProxyConfig {
    ProxyConfig {
        proxy_axios: true,
        url: url.to_owned(),
        port,
        username: username.to_owned(),
        password: password.to_owned(),
    }
}

#[test]
fn no_proxy_means_direct_traffic() {
    let net = NetworkContext::for_account("a@example.com", &ProxyConfig::default());

    assert_eq!(net.account, "a@example.com");
    assert!(!net.is_proxied());
    assert!(!net.proxy_api_traffic);
}

#[test]
fn bare_host_defaults_to_http_with_port() {
    let net = NetworkContext::for_account("a", &proxy("proxy.local", 3128, "", ""));
    assert_eq!(net.proxy_url.as_deref(), Some("http://proxy.local:3128"));
    assert!(net.proxy_api_traffic);
}

#[test]
fn scheme_and_credentials_are_kept() {
    let net = NetworkContext::for_account("a", &proxy("socks5://10.0.0.1/", 1080, "u", "p"));
    assert_eq!(net.proxy_url.as_deref(), Some("socks5://u:p@10.0.0.1:1080"));
}

#[test]
fn zero_port_is_omitted() {
    let net = NetworkContext::for_account("a", &proxy("https://gw.example.com", 0, "", ""));
    assert_eq!(net.proxy_url.as_deref(), Some("https://gw.example.com"));
}

#[test]
fn api_traffic_flag_follows_proxy_axios() {
    let mut config = proxy("proxy.local", 8080, "", "");
    config.proxy_axios = false;

    let net = NetworkContext::for_account("a", &config);
    assert!(net.is_proxied());
    assert!(!net.proxy_api_traffic);
}

#[test]
fn debug_output_hides_the_proxy_url() {
    let net = NetworkContext::for_account("a", &proxy("proxy.local", 8080, "user", "hunter2"));
    let rendered = format!("{net:?}");

    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("proxied: true"));
}

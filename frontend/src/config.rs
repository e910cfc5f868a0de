use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub api_base_url: Option<String>,
    pub presence_ws_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

pub const DEV_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEV_PRESENCE_WS_URL: &str = "ws://localhost:8000/ws/online-status";
pub const PROD_API_BASE_URL: &str = "https://api.bazari.shop/api";
pub const PROD_PRESENCE_WS_URL: &str = "wss://api.bazari.shop/ws/online-status";

/// Ports the local dev servers bind to (vite, trunk, CRA leftovers).
const DEV_PORTS: [&str; 7] = ["3000", "3001", "4000", "4028", "5000", "5173", "8080"];

static API_BASE_URL: OnceLock<String> = OnceLock::new();
static PRESENCE_WS_URL: OnceLock<String> = OnceLock::new();

/// Classify where the app is running from the page origin. Local hostnames
/// and well-known dev ports map to Development; everything else is treated
/// as Production, the safe default for unknown domains.
pub fn detect_environment(hostname: &str, port: &str) -> Environment {
    if hostname == "localhost"
        || hostname == "127.0.0.1"
        || hostname.ends_with(".local")
        || is_private_ip(hostname)
    {
        return Environment::Development;
    }
    if DEV_PORTS.contains(&port) {
        return Environment::Development;
    }
    Environment::Production
}

/// RFC 1918 ranges plus loopback.
pub fn is_private_ip(hostname: &str) -> bool {
    let mut octets = [0u16; 4];
    let mut count = 0;
    for part in hostname.split('.') {
        if count == 4 {
            return false;
        }
        match part.parse::<u16>() {
            Ok(value) if value <= 255 && !part.is_empty() => {
                octets[count] = value;
                count += 1;
            }
            _ => return false,
        }
    }
    if count != 4 {
        return false;
    }
    let [a, b, ..] = octets;
    a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168) || a == 127
}

fn default_api_base_url(environment: Environment) -> &'static str {
    match environment {
        Environment::Development => DEV_API_BASE_URL,
        Environment::Production => PROD_API_BASE_URL,
    }
}

fn default_presence_ws_url(environment: Environment) -> &'static str {
    match environment {
        Environment::Development => DEV_PRESENCE_WS_URL,
        Environment::Production => PROD_PRESENCE_WS_URL,
    }
}

fn detected_environment() -> Environment {
    let Some(window) = crate::utils::storage::window() else {
        return Environment::Production;
    };
    let location = window.location();
    let hostname = location.hostname().unwrap_or_default();
    let port = location.port().unwrap_or_default();
    detect_environment(&hostname, &port)
}

fn global_string(object_key: &str, upper: &str, lower: &str) -> Option<String> {
    // Optional deploy-time globals: window.__BAZARI_ENV = { API_BASE_URL }
    // or window.__BAZARI_CONFIG = { api_base_url } written by env.js.
    let window = crate::utils::storage::window()?;
    let any = js_sys::Reflect::get(&window, &object_key.into()).ok()?;
    if any.is_undefined() || any.is_null() {
        return None;
    }
    let obj = js_sys::Object::from(any);
    let val = js_sys::Reflect::get(&obj, &upper.into())
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
        .or_else(|| js_sys::Reflect::get(&obj, &lower.into()).ok());
    val.and_then(|v| v.as_string())
}

fn api_url_from_globals() -> Option<String> {
    global_string("__BAZARI_ENV", "API_BASE_URL", "api_base_url")
        .or_else(|| global_string("__BAZARI_CONFIG", "api_base_url", "API_BASE_URL"))
}

fn presence_url_from_globals() -> Option<String> {
    global_string("__BAZARI_ENV", "PRESENCE_WS_URL", "presence_ws_url")
        .or_else(|| global_string("__BAZARI_CONFIG", "presence_ws_url", "PRESENCE_WS_URL"))
}

fn cache_api_base_url(value: &str) -> String {
    let value = value.to_string();
    let _ = API_BASE_URL.set(value.clone());
    value
}

async fn fetch_runtime_config() -> Option<RuntimeConfig> {
    let resp = reqwest::get("./config.json").await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.json::<RuntimeConfig>().await.ok()
}

/// Resolve the HTTP API base URL: deploy-time global, then `config.json`,
/// then environment detection. Cached for the lifetime of the page.
pub async fn await_api_base_url() -> String {
    if let Some(cached) = API_BASE_URL.get() {
        return cached.clone();
    }
    if let Some(existing) = api_url_from_globals() {
        return cache_api_base_url(&existing);
    }
    if let Some(cfg) = fetch_runtime_config().await {
        if let Some(url) = &cfg.presence_ws_url {
            let _ = PRESENCE_WS_URL.set(url.clone());
        }
        if let Some(url) = cfg.api_base_url {
            return cache_api_base_url(&url);
        }
    }
    cache_api_base_url(default_api_base_url(detected_environment()))
}

/// Resolve the presence endpoint with the same override order. Synchronous:
/// `config.json` only contributes when [`init`] already ran.
pub fn presence_ws_url() -> String {
    if let Some(cached) = PRESENCE_WS_URL.get() {
        return cached.clone();
    }
    let url = presence_url_from_globals()
        .unwrap_or_else(|| default_presence_ws_url(detected_environment()).to_string());
    let _ = PRESENCE_WS_URL.set(url.clone());
    url
}

pub async fn init() {
    let _ = await_api_base_url().await;
    let _ = presence_ws_url();
}

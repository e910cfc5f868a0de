use reqwest::{Client, StatusCode};
use web_sys::Storage;

use crate::{api::types::*, config, utils::storage as storage_utils};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const CURRENT_USER_KEY: &str = "current_user";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
        }
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: Some(base_url.into()),
        }
    }

    pub(super) fn http_client(&self) -> &Client {
        &self.client
    }

    pub(super) async fn resolved_base_url(&self) -> String {
        if let Some(base) = &self.base_url {
            base.clone()
        } else {
            config::await_api_base_url().await
        }
    }

    pub(super) fn get_auth_headers(&self) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();

        let token = stored_access_token().ok_or("No token")?;
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", token)
                .parse()
                .map_err(|_| "Invalid token format")?,
        );

        Ok(headers)
    }

    pub(super) fn handle_unauthorized_status(status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED {
            clear_stored_auth();
            Self::redirect_to_login_if_needed();
        }
    }

    fn redirect_to_login_if_needed() {
        if let Some(window) = storage_utils::window() {
            let location = window.location();
            if let Ok(pathname) = location.pathname() {
                if pathname == "/login" {
                    return;
                }
            }
            let _ = location.set_href("/login");
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Store the credential and sanitized user after a successful login so every
/// tab (and the presence channel) can pick them up.
pub fn persist_auth(storage: &Storage, response: &LoginResponse) -> Result<(), String> {
    storage
        .set_item(ACCESS_TOKEN_KEY, &response.access_token)
        .map_err(|_| "Failed to store token")?;
    let user_json =
        serde_json::to_string(&response.user).map_err(|_| "Failed to serialize user profile")?;
    storage
        .set_item(CURRENT_USER_KEY, &user_json)
        .map_err(|_| "Failed to store user profile")?;
    Ok(())
}

/// The access credential the presence channel attaches to its
/// `authenticate` message.
pub fn stored_access_token() -> Option<String> {
    storage_utils::local_storage()?.get_item(ACCESS_TOKEN_KEY).ok()?
}

pub fn stored_current_user() -> Option<UserResponse> {
    let raw = storage_utils::local_storage()?
        .get_item(CURRENT_USER_KEY)
        .ok()??;
    serde_json::from_str(&raw).ok()
}

pub fn clear_stored_auth() {
    if let Some(storage) = storage_utils::local_storage() {
        let _ = storage.remove_item(ACCESS_TOKEN_KEY);
        let _ = storage.remove_item(CURRENT_USER_KEY);
    }
}

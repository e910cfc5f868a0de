use super::{
    client::{clear_stored_auth, persist_auth, ApiClient},
    types::{ApiError, LoginRequest, LoginResponse, UserResponse},
};
use crate::utils::storage as storage_utils;

impl ApiClient {
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, String> {
        let base_url = self.resolved_base_url().await;
        let response = self
            .http_client()
            .post(format!("{}/auth/login", base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if response.status().is_success() {
            let login_response: LoginResponse = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse response: {}", e))?;

            match storage_utils::local_storage() {
                Some(storage) => persist_auth(&storage, &login_response)?,
                None => log::warn!("auth: no localStorage, credential kept in memory only"),
            }
            Ok(login_response)
        } else {
            let error: ApiError = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse error: {}", e))?;
            Err(error.error)
        }
    }

    pub async fn logout(&self) -> Result<(), String> {
        let headers = self.get_auth_headers()?;
        let base_url = self.resolved_base_url().await;

        let resp = self
            .http_client()
            .post(format!("{}/auth/logout", base_url))
            .headers(headers)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        // The local credential goes away regardless of what the server said.
        clear_stored_auth();

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let err: Result<ApiError, _> = resp.json().await;
            Err(err
                .map(|e| e.error)
                .unwrap_or_else(|_| "Logout failed".into()))
        }
    }

    pub async fn get_me(&self) -> Result<UserResponse, String> {
        let headers = self.get_auth_headers()?;
        let base_url = self.resolved_base_url().await;
        let response = self
            .http_client()
            .get(format!("{}/auth/me", base_url))
            .headers(headers)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        Self::handle_unauthorized_status(status);
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| format!("Failed to parse response: {}", e))
        } else {
            let error: ApiError = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse error: {}", e))?;
            Err(error.error)
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::session::store::ProfileFragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    ShopOwner,
    Admin,
    DeliveryAgent,
}

impl UserRole {
    pub fn is_shop_owner(&self) -> bool {
        matches!(self, UserRole::ShopOwner)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub user_type: UserRole,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub shop_id: Option<String>,
}

impl UserResponse {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// The sanitized slice of this user that may be persisted with the
    /// session. Credentials and tokens never go through here.
    pub fn profile_fragment(&self) -> ProfileFragment {
        ProfileFragment {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.user_type,
            display_name: self.display_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

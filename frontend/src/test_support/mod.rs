#[cfg(not(target_arch = "wasm32"))]
pub mod ssr;

#[cfg(not(target_arch = "wasm32"))]
pub use ssr::with_runtime;

use std::cell::Cell;

use crate::api::types::{UserResponse, UserRole};
use crate::utils::clock::Clock;

/// Deterministic clock for driving the session core in tests.
pub struct FakeClock {
    now: Cell<i64>,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

pub fn customer_user() -> UserResponse {
    UserResponse {
        id: "u-customer".into(),
        email: "customer@example.com".into(),
        user_type: UserRole::Customer,
        first_name: "Carla".into(),
        last_name: "Mbe".into(),
        shop_id: None,
    }
}

pub fn shop_owner_user() -> UserResponse {
    UserResponse {
        id: "u-owner".into(),
        email: "owner@example.com".into(),
        user_type: UserRole::ShopOwner,
        first_name: "Samuel".into(),
        last_name: "Eto".into(),
        shop_id: Some("shop-1".into()),
    }
}

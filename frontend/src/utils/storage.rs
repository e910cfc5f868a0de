use web_sys::{Storage, Window};

/// The browser window, or `None` off-browser. web-sys' own accessor panics
/// on native targets, so host builds (SSR renders, tests) go through here.
pub fn window() -> Option<Window> {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::window()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        None
    }
}

/// localStorage, when the platform provides one. `None` covers both a
/// missing window (host builds, workers) and storage disabled by the
/// browser (private mode, security settings).
pub fn local_storage() -> Option<Storage> {
    window()?.local_storage().ok().flatten()
}

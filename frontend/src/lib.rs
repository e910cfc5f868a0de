pub mod api;
pub mod components;
pub mod config;
pub mod pages;
pub mod presence;
pub mod session;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;

#[cfg(target_arch = "wasm32")]
pub fn start() {
    use leptos::*;
    use leptos_router::*;
    use wasm_bindgen_futures::spawn_local;

    use pages::{home::HomePage, login::LoginPage};
    use state::{auth::AuthProvider, presence::PresenceProvider, session::SessionProvider};

    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Starting Bazari frontend (wasm)");

    // Resolve runtime config (API base URL, presence endpoint) before the
    // providers come up; window globals take precedence over config.json.
    spawn_local(async move {
        config::init().await;
        log::info!("Runtime config initialized");
        mount_to_body(|| {
            view! {
                <SessionProvider>
                    <AuthProvider>
                        <PresenceProvider>
                            <Router>
                                <Routes>
                                    <Route path="/" view=HomePage/>
                                    <Route path="/login" view=LoginPage/>
                                </Routes>
                            </Router>
                        </PresenceProvider>
                    </AuthProvider>
                </SessionProvider>
            }
        });
    });
}

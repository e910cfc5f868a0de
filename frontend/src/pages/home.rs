use leptos::*;

use crate::components::common::ConnectionLostBanner;
use crate::components::session_expiry_warning::SessionExpiryWarning;
use crate::state::auth::{use_auth, use_logout_action};

#[component]
pub fn HomePage() -> impl IntoView {
    let (auth, _) = use_auth();
    let logout_action = use_logout_action();
    let logout_pending = logout_action.pending();

    view! {
        <main class="home-page">
            <ConnectionLostBanner/>
            <SessionExpiryWarning/>
            <header class="site-header">
                <h1>"Bazari"</h1>
                <Show
                    when=move || auth.get().is_authenticated
                    fallback=|| view! { <a href="/login">"Sign in"</a> }
                >
                    <button
                        class="btn-ghost"
                        disabled=move || logout_pending.get()
                        on:click=move |_| logout_action.dispatch(())
                    >
                        "Sign out"
                    </button>
                </Show>
            </header>
            <section class="catalog-placeholder">
                <p>"Product catalog renders here."</p>
            </section>
        </main>
    }
}

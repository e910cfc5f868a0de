use leptos::*;

use crate::state::presence::use_presence;

#[component]
pub fn LoadingSpinner() -> impl IntoView {
    view! {
        <div class="loading-spinner">
            <div class="animate-spin"></div>
        </div>
    }
}

/// Terminal presence failure: the reconnect budget ran out and only a page
/// reload will bring the live status back.
#[component]
pub fn ConnectionLostBanner() -> impl IntoView {
    let presence = use_presence();
    let lost = presence.connection_lost;
    view! {
        <Show when=move || lost.get() fallback=|| ()>
            <div class="banner banner-error" role="alert">
                "Connection lost. Please refresh the page."
            </div>
        </Show>
    }
}

use leptos::*;

use crate::state::presence::use_presence;

/// Online dot plus status text for a shop card, driven by the presence
/// roster ("Online", "Last seen 5 minutes ago", "Offline").
#[component]
pub fn OnlineStatusIndicator(
    #[prop(into)] shop_id: String,
    #[prop(into)] owner_id: String,
) -> impl IntoView {
    let presence = use_presence();
    let status = create_memo(move |_| presence.shop_status(&shop_id, &owner_id));

    view! {
        <span class="online-status" class=("is-online", move || status.get().online)>
            <span class="online-status-dot"></span>
            <span class="online-status-label">{move || status.get().display}</span>
        </span>
    }
}

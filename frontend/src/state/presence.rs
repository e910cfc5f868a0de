use chrono::Utc;
use leptos::*;
use std::rc::Rc;

use crate::config;
use crate::presence::channel::ConnectionState;
use crate::presence::protocol::ClientMessage;
use crate::presence::roster::{shop_status_display, PresenceRoster, ShopStatus};
use crate::presence::socket::{PresenceIdentity, PresenceSocket};
use crate::state::auth::use_auth;

/// Reactive face of the presence channel: the roster signal plus the
/// connection flags the indicator components render from.
#[derive(Clone)]
pub struct PresenceHandle {
    pub roster: RwSignal<PresenceRoster>,
    pub connected: RwSignal<bool>,
    /// Set once the retry budget is exhausted; only a reload clears it.
    pub connection_lost: RwSignal<bool>,
    socket: Rc<PresenceSocket>,
}

impl PresenceHandle {
    pub fn connect(&self) {
        self.socket.connect();
    }

    pub fn send_message(&self, message: &ClientMessage) {
        self.socket.send(message);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.roster.with(|roster| roster.is_user_online(user_id))
    }

    pub fn is_shop_online(&self, shop_id: &str) -> bool {
        self.roster.with(|roster| roster.is_shop_online(shop_id))
    }

    pub fn format_last_seen(&self, user_id: &str) -> String {
        self.roster
            .with(|roster| roster.format_last_seen(user_id, Utc::now()))
    }

    pub fn shop_status(&self, shop_id: &str, owner_id: &str) -> ShopStatus {
        self.roster
            .with(|roster| shop_status_display(roster, shop_id, owner_id, Utc::now()))
    }

    pub fn set_identity(&self, identity: Option<PresenceIdentity>) {
        self.socket.set_identity(identity);
    }
}

pub fn provide_presence() -> PresenceHandle {
    let roster = create_rw_signal(PresenceRoster::default());
    let connected = create_rw_signal(false);
    let connection_lost = create_rw_signal(false);

    let socket = Rc::new(PresenceSocket::new(
        config::presence_ws_url(),
        move |message| roster.update(|r| r.apply(message)),
        move |state| {
            connected.set(matches!(
                state,
                ConnectionState::Authenticating | ConnectionState::Connected
            ));
            if state == ConnectionState::Lost {
                connection_lost.set(true);
            }
        },
    ));

    let handle = PresenceHandle {
        roster,
        connected,
        connection_lost,
        socket,
    };

    // Follow the auth state: adopt the identity and connect once the user is
    // authenticated; dropping the identity on logout also stops the
    // heartbeat.
    let (auth, _) = use_auth();
    {
        let handle = handle.clone();
        create_effect(move |_| {
            let state = auth.get();
            match (&state.user, state.is_authenticated) {
                (Some(user), true) => {
                    handle.set_identity(Some(PresenceIdentity {
                        user_id: user.id.clone(),
                        user_type: user.user_type,
                    }));
                    handle.connect();
                }
                _ => handle.set_identity(None),
            }
        });
    }

    provide_context(handle.clone());
    handle
}

pub fn use_presence() -> PresenceHandle {
    match use_context::<PresenceHandle>() {
        Some(handle) => handle,
        None => provide_presence(),
    }
}

#[component]
pub fn PresenceProvider(children: Children) -> impl IntoView {
    provide_presence();
    view! { <>{children()}</> }
}

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use chrono::Utc;
use gloo_timers::callback::{Interval, Timeout};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use crate::api::client::stored_access_token;
use crate::api::types::UserRole;
use crate::presence::channel::{
    ChannelCore, ConnectionState, Disposition, ReconnectPolicy, HEARTBEAT_INTERVAL_MS,
};
use crate::presence::protocol::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceIdentity {
    pub user_id: String,
    pub user_type: UserRole,
}

/// Browser binding of the presence channel: one WebSocket, the closures that
/// keep it alive, and the heartbeat/reconnect timers. All decisions about
/// state and retry cadence are delegated to [`ChannelCore`].
pub struct PresenceSocket {
    inner: Rc<Inner>,
}

struct Callbacks {
    _onopen: Closure<dyn FnMut()>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(ErrorEvent)>,
}

struct Inner {
    url: String,
    identity: RefCell<Option<PresenceIdentity>>,
    core: RefCell<ChannelCore>,
    deliver: Box<dyn Fn(&ServerMessage)>,
    notify_state: Box<dyn Fn(ConnectionState)>,
    socket: RefCell<Option<WebSocket>>,
    callbacks: RefCell<Option<Callbacks>>,
    heartbeat: RefCell<Option<Interval>>,
    reconnect: RefCell<Option<Timeout>>,
    shutdown: Cell<bool>,
}

impl PresenceSocket {
    /// `deliver` receives every well-formed inbound message; `notify_state`
    /// is invoked on each connection-state transition.
    pub fn new(
        url: String,
        deliver: impl Fn(&ServerMessage) + 'static,
        notify_state: impl Fn(ConnectionState) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                url,
                identity: RefCell::new(None),
                core: RefCell::new(ChannelCore::new(ReconnectPolicy::default())),
                deliver: Box::new(deliver),
                notify_state: Box::new(notify_state),
                socket: RefCell::new(None),
                callbacks: RefCell::new(None),
                heartbeat: RefCell::new(None),
                reconnect: RefCell::new(None),
                shutdown: Cell::new(false),
            }),
        }
    }

    /// Who the channel authenticates as. Passing `None` (logout) stops the
    /// heartbeat; a new identity on a live socket re-authenticates in place.
    pub fn set_identity(&self, identity: Option<PresenceIdentity>) {
        *self.inner.identity.borrow_mut() = identity;
        Inner::identity_changed(&self.inner);
    }

    pub fn connect(&self) {
        Inner::connect(&self.inner);
    }

    pub fn send(&self, message: &ClientMessage) {
        self.inner.send(message);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.core.borrow().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core.borrow().state()
    }

    pub fn disconnect(&self) {
        self.inner.disconnect();
    }
}

impl Drop for PresenceSocket {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl Inner {
    fn connect(this: &Rc<Self>) {
        if this.shutdown.get() {
            return;
        }
        if this.identity.borrow().is_none() {
            log::info!("presence: skipping connect, user not authenticated");
            return;
        }
        {
            let core = this.core.borrow();
            if core.state() == ConnectionState::Connecting || core.is_connected() {
                return;
            }
        }

        this.core.borrow_mut().on_connect_started();
        (this.notify_state)(ConnectionState::Connecting);
        log::info!("presence: connecting to {}", this.url);

        let socket = match WebSocket::new(&this.url) {
            Ok(socket) => socket,
            Err(err) => {
                log::error!("presence: failed to open socket: {err:?}");
                Inner::handle_close(this);
                return;
            }
        };

        let onopen: Closure<dyn FnMut()> = Closure::wrap(Box::new({
            let weak = Rc::downgrade(this);
            move || {
                if let Some(inner) = weak.upgrade() {
                    Inner::handle_open(&inner);
                }
            }
        }));
        let onmessage: Closure<dyn FnMut(MessageEvent)> = Closure::wrap(Box::new({
            let weak = Rc::downgrade(this);
            move |event: MessageEvent| {
                if let Some(inner) = weak.upgrade() {
                    if let Some(text) = event.data().as_string() {
                        Inner::handle_message(&inner, &text);
                    }
                }
            }
        }));
        let onclose: Closure<dyn FnMut(CloseEvent)> = Closure::wrap(Box::new({
            let weak = Rc::downgrade(this);
            move |_: CloseEvent| {
                if let Some(inner) = weak.upgrade() {
                    Inner::handle_close(&inner);
                }
            }
        }));
        let onerror: Closure<dyn FnMut(ErrorEvent)> =
            Closure::wrap(Box::new(move |event: ErrorEvent| {
                log::error!("presence: socket error: {}", event.message());
            }));

        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        *this.socket.borrow_mut() = Some(socket);
        *this.callbacks.borrow_mut() = Some(Callbacks {
            _onopen: onopen,
            _onmessage: onmessage,
            _onclose: onclose,
            _onerror: onerror,
        });
    }

    fn handle_open(this: &Rc<Self>) {
        this.core.borrow_mut().on_open();
        (this.notify_state)(ConnectionState::Authenticating);
        log::info!("presence: socket open");

        this.authenticate();
        if this.heartbeat_role() {
            Inner::start_heartbeat(this);
        }
    }

    fn handle_message(this: &Rc<Self>, raw: &str) {
        let message = this.core.borrow_mut().on_message(raw);
        if let Some(message) = message {
            (this.notify_state)(this.core.borrow().state());
            (this.deliver)(&message);
        }
    }

    fn handle_close(this: &Rc<Self>) {
        this.stop_heartbeat();
        if this.shutdown.get() {
            return;
        }
        log::info!("presence: socket closed");

        let disposition = this.core.borrow_mut().on_close();
        match disposition {
            Disposition::Retry { attempt, delay_ms } => {
                (this.notify_state)(ConnectionState::BackoffWait);
                log::info!(
                    "presence: reconnect attempt {} in {}ms",
                    attempt + 1,
                    delay_ms
                );
                let weak = Rc::downgrade(this);
                let timeout = Timeout::new(delay_ms as u32, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.reconnect.borrow_mut().take();
                        Inner::connect(&inner);
                    }
                });
                // Replacing a pending timeout drops (cancels) it first.
                *this.reconnect.borrow_mut() = Some(timeout);
            }
            Disposition::GiveUp => {
                (this.notify_state)(ConnectionState::Lost);
                log::error!("presence: connection lost, manual reload required");
            }
        }
    }

    fn identity_changed(this: &Rc<Self>) {
        let connected = this.core.borrow().is_connected();
        if connected {
            if this.identity.borrow().is_some() {
                this.authenticate();
            }
            if this.heartbeat_role() {
                Inner::start_heartbeat(this);
            } else {
                this.stop_heartbeat();
            }
        } else {
            this.stop_heartbeat();
        }
    }

    fn authenticate(&self) {
        let Some(identity) = self.identity.borrow().clone() else {
            return;
        };
        self.send(&ClientMessage::Authenticate {
            user_id: identity.user_id,
            user_type: identity.user_type,
            access_token: stored_access_token().unwrap_or_default(),
        });
    }

    fn heartbeat_role(&self) -> bool {
        self.identity
            .borrow()
            .as_ref()
            .is_some_and(|identity| identity.user_type.is_shop_owner())
    }

    fn start_heartbeat(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let interval = Interval::new(HEARTBEAT_INTERVAL_MS, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(identity) = inner.identity.borrow().clone() else {
                return;
            };
            if !identity.user_type.is_shop_owner() {
                return;
            }
            inner.send(&ClientMessage::Heartbeat {
                user_id: identity.user_id,
                timestamp: Utc::now().to_rfc3339(),
            });
        });
        // Clear-before-set: state churn must never stack intervals.
        *this.heartbeat.borrow_mut() = Some(interval);
    }

    fn stop_heartbeat(&self) {
        self.heartbeat.borrow_mut().take();
    }

    fn send(&self, message: &ClientMessage) {
        let socket = self.socket.borrow();
        let Some(socket) = socket.as_ref() else {
            return;
        };
        if socket.ready_state() != WebSocket::OPEN {
            return;
        }
        if let Err(err) = socket.send_with_str(&message.encode()) {
            log::warn!("presence: send failed: {err:?}");
        }
    }

    fn disconnect(&self) {
        self.shutdown.set(true);
        self.stop_heartbeat();
        self.reconnect.borrow_mut().take();
        if let Some(socket) = self.socket.borrow_mut().take() {
            socket.set_onopen(None);
            socket.set_onmessage(None);
            socket.set_onclose(None);
            socket.set_onerror(None);
            let _ = socket.close();
        }
        self.callbacks.borrow_mut().take();
    }
}

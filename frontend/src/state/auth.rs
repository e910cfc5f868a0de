use leptos::*;

use crate::api::{client::stored_current_user, ApiClient, LoginRequest, UserResponse};
use crate::state::session::{use_session, SessionHandle};

type AuthContext = (ReadSignal<AuthState>, WriteSignal<AuthState>);

#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub user: Option<UserResponse>,
    pub is_authenticated: bool,
    pub loading: bool,
}

fn create_auth_context(session: &SessionHandle) -> AuthContext {
    let (auth_state, set_auth_state) = create_signal(AuthState::default());

    // A valid restored session with a cached profile renders authenticated
    // immediately; the background `me` call below is the authority.
    if session.is_valid() {
        if let Some(user) = stored_current_user() {
            set_auth_state.update(|state| {
                state.user = Some(user);
                state.is_authenticated = true;
            });
        }
    }

    // Session expiry (idle or absolute) logs the UI out.
    let expired = session.expired;
    create_effect(move |_| {
        if expired.get().is_some() {
            set_auth_state.update(|state| {
                state.user = None;
                state.is_authenticated = false;
                state.loading = false;
            });
        }
    });

    #[cfg(target_arch = "wasm32")]
    {
        set_auth_state.update(|state| state.loading = true);
        let api_client = use_context::<ApiClient>().unwrap_or_default();
        spawn_local(async move {
            match api_client.get_me().await {
                Ok(user) => set_auth_state.update(|state| {
                    state.user = Some(user);
                    state.is_authenticated = true;
                    state.loading = false;
                }),
                Err(_) => set_auth_state.update(|state| {
                    state.user = None;
                    state.is_authenticated = false;
                    state.loading = false;
                }),
            }
        });
    }

    (auth_state, set_auth_state)
}

#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let session = use_session();
    let ctx = create_auth_context(&session);
    provide_context::<AuthContext>(ctx);
    view! { <>{children()}</> }
}

pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().unwrap_or_else(|| create_signal(AuthState::default()))
}

pub async fn login_request(
    request: LoginRequest,
    api: &ApiClient,
    set_auth_state: WriteSignal<AuthState>,
    session: SessionHandle,
) -> Result<(), String> {
    set_auth_state.update(|state| state.loading = true);

    match api.login(request).await {
        Ok(response) => {
            let fragment = response.user.profile_fragment();
            if session.is_valid() {
                // Re-authentication over a live session rotates the id
                // instead of resetting the timestamps (fixation defense).
                match session.rotate() {
                    Ok(_) => session.controller.set_profile(fragment),
                    Err(_) => {
                        session.begin(Some(fragment));
                    }
                }
            } else {
                session.begin(Some(fragment));
            }

            set_auth_state.update(|state| {
                state.user = Some(response.user);
                state.is_authenticated = true;
                state.loading = false;
            });
            Ok(())
        }
        Err(error) => {
            set_auth_state.update(|state| state.loading = false);
            Err(error)
        }
    }
}

pub async fn logout(
    api: &ApiClient,
    set_auth_state: WriteSignal<AuthState>,
    session: SessionHandle,
) -> Result<(), String> {
    let result = api.logout().await;

    session.end();
    set_auth_state.update(|state| {
        state.user = None;
        state.is_authenticated = false;
        state.loading = false;
    });

    result
}

pub fn use_login_action() -> Action<LoginRequest, Result<(), String>> {
    let (_auth, set_auth) = use_auth();
    let session = use_session();
    let api = use_context::<ApiClient>().unwrap_or_default();

    create_action(move |request: &LoginRequest| {
        let payload = request.clone();
        let api = api.clone();
        let session = session.clone();
        async move { login_request(payload, &api, set_auth, session).await }
    })
}

pub fn use_logout_action() -> Action<(), Result<(), String>> {
    let (_auth, set_auth) = use_auth();
    let session = use_session();
    let api = use_context::<ApiClient>().unwrap_or_default();

    create_action(move |_: &()| {
        let api = api.clone();
        let session = session.clone();
        async move { logout(&api, set_auth, session).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_runtime;

    #[test]
    fn use_auth_returns_default_without_context() {
        with_runtime(|| {
            let (state, _set_state) = use_auth();
            let snapshot = state.get_untracked();
            assert!(!snapshot.is_authenticated);
            assert!(snapshot.user.is_none());
            assert!(!snapshot.loading);
        });
    }

    #[test]
    fn provider_bootstrap_is_unauthenticated_without_a_session() {
        with_runtime(|| {
            let session = use_session();
            let (state, _set) = create_auth_context(&session);
            let snapshot = state.get_untracked();
            assert!(!snapshot.is_authenticated);
            assert!(snapshot.user.is_none());
        });
    }
}

use crate::{
    api::UserResponse, components::common::LoadingSpinner, state::auth::use_auth,
};
use leptos::*;

#[component]
pub fn RequireAuth(children: ChildrenFn) -> impl IntoView {
    let (auth, _) = use_auth();
    let is_authenticated = create_memo(move |_| auth.get().is_authenticated);
    let is_loading = create_memo(move |_| auth.get().loading);
    create_effect(move |_| {
        let state = auth.get();
        if state.loading || state.is_authenticated {
            return;
        }
        if let Some(win) = web_sys::window() {
            let _ = win.location().set_href("/login");
        }
    });
    view! {
        <Show
            when=move || should_render_children(is_authenticated.get(), is_loading.get())
            fallback=move || {
                if is_loading.get() {
                    view! { <LoadingSpinner /> }.into_view()
                } else {
                    ().into_view()
                }
            }
        >
            {children()}
        </Show>
    }
}

fn should_render_children(is_authenticated: bool, is_loading: bool) -> bool {
    is_authenticated && !is_loading
}

#[component]
pub fn RequireShopOwner(children: ChildrenFn) -> impl IntoView {
    let (auth, _) = use_auth();
    let is_authenticated = create_memo(move |_| auth.get().is_authenticated);
    let is_loading = create_memo(move |_| auth.get().loading);
    let is_shop_owner = create_memo(move |_| is_shop_owner_user(auth.get().user.as_ref()));
    create_effect(move |_| {
        let state = auth.get();
        if state.loading {
            return;
        }
        let target = if !state.is_authenticated {
            "/login"
        } else if !is_shop_owner_user(state.user.as_ref()) {
            "/"
        } else {
            return;
        };
        if let Some(win) = web_sys::window() {
            let _ = win.location().set_href(target);
        }
    });
    view! {
        <Show
            when=move || {
                should_render_owner_children(
                    is_authenticated.get(),
                    is_loading.get(),
                    is_shop_owner.get(),
                )
            }
            fallback=move || {
                if is_loading.get() {
                    view! { <LoadingSpinner /> }.into_view()
                } else {
                    ().into_view()
                }
            }
        >
            {children()}
        </Show>
    }
}

fn is_shop_owner_user(user: Option<&UserResponse>) -> bool {
    user.map(|u| u.user_type.is_shop_owner()).unwrap_or(false)
}

fn should_render_owner_children(
    is_authenticated: bool,
    is_loading: bool,
    is_shop_owner: bool,
) -> bool {
    is_authenticated && is_shop_owner && !is_loading
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::{RequireAuth, RequireShopOwner};
    use crate::state::auth::AuthState;
    use crate::test_support::ssr::render_to_string;
    use crate::test_support::{customer_user, shop_owner_user};
    use leptos::*;

    fn provide_auth_state(state: AuthState) {
        let ctx = create_signal(state);
        provide_context(ctx);
    }

    #[test]
    fn require_auth_renders_children_when_authenticated() {
        let html = render_to_string(move || {
            provide_auth_state(AuthState {
                user: Some(customer_user()),
                is_authenticated: true,
                loading: false,
            });
            view! {
                <RequireAuth>
                    {|| view! { <div>"protected-content"</div> }}
                </RequireAuth>
            }
        });
        assert!(html.contains("protected-content"));
    }

    #[test]
    fn require_auth_hides_children_when_unauthenticated() {
        let html = render_to_string(move || {
            provide_auth_state(AuthState::default());
            view! {
                <RequireAuth>
                    {|| view! { <div>"protected-content"</div> }}
                </RequireAuth>
            }
        });
        assert!(!html.contains("protected-content"));
    }

    #[test]
    fn require_auth_shows_spinner_while_loading() {
        let html = render_to_string(move || {
            provide_auth_state(AuthState {
                user: None,
                is_authenticated: false,
                loading: true,
            });
            view! {
                <RequireAuth>
                    {|| view! { <div>"protected-content"</div> }}
                </RequireAuth>
            }
        });
        assert!(html.contains("animate-spin"));
    }

    #[test]
    fn require_shop_owner_renders_for_owners_only() {
        let html = render_to_string(move || {
            provide_auth_state(AuthState {
                user: Some(shop_owner_user()),
                is_authenticated: true,
                loading: false,
            });
            view! {
                <RequireShopOwner>
                    {|| view! { <div>"owner-dashboard"</div> }}
                </RequireShopOwner>
            }
        });
        assert!(html.contains("owner-dashboard"));

        let html = render_to_string(move || {
            provide_auth_state(AuthState {
                user: Some(customer_user()),
                is_authenticated: true,
                loading: false,
            });
            view! {
                <RequireShopOwner>
                    {|| view! { <div>"owner-dashboard"</div> }}
                </RequireShopOwner>
            }
        });
        assert!(!html.contains("owner-dashboard"));
    }
}

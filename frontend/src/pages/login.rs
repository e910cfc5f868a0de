use leptos::*;

use crate::api::LoginRequest;
use crate::state::auth::use_login_action;

#[component]
pub fn LoginPage() -> impl IntoView {
    let login_action = use_login_action();
    let (email, set_email) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let pending = login_action.pending();
    let error = create_memo(move |_| match login_action.value().get() {
        Some(Err(message)) => Some(message),
        _ => None,
    });

    create_effect(move |_| {
        if matches!(login_action.value().get(), Some(Ok(()))) {
            if let Some(win) = web_sys::window() {
                let _ = win.location().set_href("/");
            }
        }
    });

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        if pending.get_untracked() {
            return;
        }
        login_action.dispatch(LoginRequest {
            email: email.get_untracked(),
            password: password.get_untracked(),
        });
    };

    view! {
        <main class="login-page">
            <h1>"Sign in to Bazari"</h1>
            <form on:submit=on_submit>
                <label>
                    "Email"
                    <input
                        type="email"
                        prop:value=email
                        on:input=move |ev| set_email.set(event_target_value(&ev))
                    />
                </label>
                <label>
                    "Password"
                    <input
                        type="password"
                        prop:value=password
                        on:input=move |ev| set_password.set(event_target_value(&ev))
                    />
                </label>
                <Show when=move || error.get().is_some() fallback=|| ()>
                    <p class="form-error" role="alert">
                        {move || error.get().unwrap_or_default()}
                    </p>
                </Show>
                <button type="submit" class="btn-primary" disabled=move || pending.get()>
                    {move || if pending.get() { "Signing in..." } else { "Sign in" }}
                </button>
            </form>
        </main>
    }
}

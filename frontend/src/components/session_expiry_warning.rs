use leptos::*;

use crate::state::session::use_session;

/// Banner shown during the warning band before an idle logout. Staying
/// signed in counts as activity; signing out invalidates immediately.
#[component]
pub fn SessionExpiryWarning() -> impl IntoView {
    let session = use_session();
    let warning = session.warning_minutes;

    let stay = {
        let session = session.clone();
        move |_| session.stay_signed_in()
    };
    let sign_out = {
        let session = session.clone();
        move |_| {
            session.end();
            if let Some(win) = web_sys::window() {
                let _ = win.location().set_href("/login");
            }
        }
    };

    view! {
        <Show when=move || warning.get().is_some() fallback=|| ()>
            <div class="session-warning" role="alert">
                <p>{move || warning_text(warning.get().unwrap_or(0))}</p>
                <button class="btn-primary" on:click=stay.clone()>
                    "Stay signed in"
                </button>
                <button class="btn-ghost" on:click=sign_out.clone()>
                    "Sign out"
                </button>
            </div>
        </Show>
    }
}

fn warning_text(minutes: i64) -> String {
    if minutes <= 1 {
        "Your session will expire in less than a minute due to inactivity.".to_string()
    } else {
        format!("Your session will expire in about {minutes} minutes due to inactivity.")
    }
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::test_support::ssr::render_to_string;

    #[test]
    fn banner_is_hidden_without_a_warning() {
        let html = render_to_string(move || {
            let _ = crate::state::session::provide_session();
            view! { <SessionExpiryWarning/> }
        });
        assert!(!html.contains("session-warning"));
    }

    #[test]
    fn banner_shows_the_remaining_minutes() {
        let html = render_to_string(move || {
            let handle = crate::state::session::provide_session();
            handle.warning_minutes.set(Some(5));
            view! { <SessionExpiryWarning/> }
        });
        assert!(html.contains("about 5 minutes"));
        assert!(html.contains("Stay signed in"));
    }
}

use chrono::Utc;
use uuid::Uuid;

/// Generate an opaque session identifier with at least 256 bits of entropy.
///
/// The id carries no meaning: it never encodes user identity or role. In the
/// browser it is drawn from `window.crypto.getRandomValues`; when that is
/// unavailable a weaker timestamp+random composite is used instead.
pub fn generate_session_id() -> String {
    match crypto_random_hex() {
        Some(hex) => hex,
        None => fallback_session_id(),
    }
}

#[cfg(target_arch = "wasm32")]
fn crypto_random_hex() -> Option<String> {
    let crypto = web_sys::window()?.crypto().ok()?;
    let mut bytes = [0u8; 32];
    crypto.get_random_values_with_u8_array(&mut bytes).ok()?;
    Some(to_hex(&bytes))
}

#[cfg(not(target_arch = "wasm32"))]
fn crypto_random_hex() -> Option<String> {
    // Uuid v4 pulls from the OS RNG on native targets; two of them give the
    // same 256-bit budget as the browser path.
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    Some(to_hex(&bytes))
}

fn fallback_session_id() -> String {
    format!(
        "{:x}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_64_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn fallback_composite_has_three_parts() {
        let id = fallback_session_id();
        assert_eq!(id.splitn(3, '-').count(), 3);
    }

    #[test]
    fn hex_encoding_is_lowercase_two_chars_per_byte() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x1a]), "00ff1a");
    }
}

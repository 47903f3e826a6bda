//! Share-link encoding and restoration.
//!
//! A settled result can be shared as a URL fragment: the description and
//! product list are JSON-serialized, Base64-encoded and percent-escaped
//! for safe placement after `#`. Images are excluded by design — they are
//! far too large for a URL — so a restored share view has text and
//! products only.
//!
//! Restoring is best-effort: any malformed fragment decodes to `None` and
//! the application stays in its default empty state.

use crate::error::{AppError, Result};
use crate::gemini::Product;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// The minimal result subset that survives a page reload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedPayload {
    pub desc: String,
    pub prods: Vec<Product>,
}

/// Fragment codec for [`SharedPayload`].
pub struct ShareCodec;

impl ShareCodec {
    /// Serializes a payload into a fragment string.
    ///
    /// JSON → Base64 (standard alphabet) → percent-encoding, so the
    /// `+`/`/`/`=` characters survive URL placement.
    pub fn encode(payload: &SharedPayload) -> Result<String> {
        let json = serde_json::to_string(payload)?;
        let encoded = BASE64.encode(json.as_bytes());
        Ok(urlencoding::encode(&encoded).into_owned())
    }

    /// Restores a payload from a fragment string.
    ///
    /// Returns `None` on any failure; restoring never throws into the
    /// caller. Fragments that were never percent-escaped decode
    /// unchanged, so both forms are accepted.
    pub fn decode(fragment: &str) -> Option<SharedPayload> {
        match Self::try_decode(fragment) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!("ignoring malformed share fragment: {}", e);
                None
            }
        }
    }

    fn try_decode(fragment: &str) -> Result<SharedPayload> {
        let unescaped = urlencoding::decode(fragment)
            .map_err(|e| AppError::ShareDecode(format!("invalid percent-encoding: {}", e)))?;
        let bytes = BASE64
            .decode(unescaped.as_bytes())
            .map_err(|e| AppError::ShareDecode(format!("invalid base64: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::ShareDecode(format!("invalid payload JSON: {}", e)))
    }
}

/// Builds an absolute share link by attaching the encoded fragment.
pub fn build_share_url(base: &str, payload: &SharedPayload) -> Result<url::Url> {
    let mut url = url::Url::parse(base)
        .map_err(|e| AppError::config(format!("Invalid share base URL: {}", e)))?;
    url.set_fragment(Some(&ShareCodec::encode(payload)?));
    Ok(url)
}

/// Clipboard capability, injected so core logic stays host-agnostic.
pub trait ClipboardWriter {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard backed by `arboard`.
pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AppError::Clipboard(format!("Could not access clipboard: {}", e)))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AppError::Clipboard(format!("Failed to copy to clipboard: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: usize, name: &str) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: format!("why you want {}", name),
            price: 0.0,
            url: format!(
                "https://www.google.com/search?tbm=shop&q={}",
                urlencoding::encode(name)
            ),
            thumbnail_url: String::new(),
        }
    }

    fn payload(count: usize) -> SharedPayload {
        SharedPayload {
            desc: "Dewy everyday glam — 물광 glass skin ✨".to_string(),
            prods: (0..count).map(|i| product(i, &format!("Item No.{}", i))).collect(),
        }
    }

    #[test]
    fn round_trip_restores_the_payload() {
        for count in [0, 1, 5, 50] {
            let original = payload(count);
            let fragment = ShareCodec::encode(&original).unwrap();
            assert_eq!(ShareCodec::decode(&fragment), Some(original));
        }
    }

    #[test]
    fn fragment_is_safe_for_url_placement() {
        let fragment = ShareCodec::encode(&payload(3)).unwrap();
        assert!(!fragment.contains('+'));
        assert!(!fragment.contains('/'));
        assert!(!fragment.contains('='));
        assert!(!fragment.contains('#'));
    }

    #[test]
    fn decode_swallows_garbage() {
        assert_eq!(ShareCodec::decode(""), None);
        assert_eq!(ShareCodec::decode("not-a-fragment"), None);
        assert_eq!(ShareCodec::decode("%ZZ"), None);
        // Valid base64, but not a payload.
        let fragment = urlencoding::encode(&BASE64.encode(b"{\"oops\": true}")).into_owned();
        assert_eq!(ShareCodec::decode(&fragment), None);
    }

    #[test]
    fn unescaped_fragments_are_accepted() {
        let original = payload(2);
        let json = serde_json::to_string(&original).unwrap();
        // Simulates a host that put the base64 after '#' without escaping;
        // urlencoding::decode leaves '+' and '/' untouched.
        let bare = BASE64.encode(json.as_bytes());
        assert_eq!(ShareCodec::decode(&bare), Some(original));
    }

    #[test]
    fn share_url_carries_a_decodable_fragment() {
        let original = payload(4);
        let url = build_share_url("https://glowup.example/app", &original).unwrap();
        let fragment = url.fragment().expect("fragment set");
        assert_eq!(ShareCodec::decode(fragment), Some(original));
    }

    #[test]
    fn share_url_rejects_invalid_base() {
        assert!(matches!(
            build_share_url("not a url", &payload(0)),
            Err(AppError::Config(_))
        ));
    }
}

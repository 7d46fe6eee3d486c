//! Cache key derivation.
//!
//! Keys are deterministic pure functions of the content they govern, so two
//! workers (or two unrelated jobs) computing a key for the same bytes land
//! on the same entry. The stage tag is folded into the hash and prefixed to
//! the key, which keeps entries for different stages of identical content
//! apart and makes keys self-describing in `SCAN` output.

use sha2::{Digest, Sha256};

use tpdf_models::Stage;

/// Hash raw content to lowercase hex.
pub fn hash_bytes(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{:02x}", b);
        acc
    })
}

/// Derive the content-addressed cache key for a stage.
///
/// `options`, when present, is serialized and folded into the hash so
/// parameterized variants of the same content do not collide.
pub fn content_key(content: &str, stage: Stage, options: Option<&serde_json::Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(stage.as_str().as_bytes());
    if let Some(options) = options {
        // to_string on a Value is deterministic for a given map ordering;
        // callers pass options built from structs, not hand-assembled maps.
        hasher.update(options.to_string().as_bytes());
    }
    let digest = hasher.finalize();
    let hex = digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{:02x}", b);
        acc
    });
    format!("{}_{}", stage.as_str(), hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_maps_to_identical_key() {
        let a = content_key("some recognized text", Stage::Translate, None);
        let b = content_key("some recognized text", Stage::Translate, None);
        assert_eq!(a, b);
    }

    #[test]
    fn stage_tag_separates_stages() {
        let ocr = content_key("abc123", Stage::Ocr, None);
        let translate = content_key("abc123", Stage::Translate, None);
        assert_ne!(ocr, translate);
        assert!(ocr.starts_with("ocr_"));
        assert!(translate.starts_with("translate_"));
    }

    #[test]
    fn options_change_the_key() {
        let plain = content_key("abc123", Stage::Preprocess, None);
        let opts = serde_json::json!({"contrast": 1.4});
        let tuned = content_key("abc123", Stage::Preprocess, Some(&opts));
        assert_ne!(plain, tuned);
    }

    #[test]
    fn hash_bytes_is_lowercase_hex() {
        let hex = hash_bytes(b"sample.png bytes");
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable 64-bit identifier of a persisted element. Zero is the invalid
/// sentinel; valid ids are allocated by the repository's sequence or by a
/// class handler's `on_next_id` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    pub const INVALID: ElementId = ElementId(0);

    #[inline]
    pub fn new(raw: u64) -> Self {
        ElementId(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Canonical textual form: lower-case hex with a `0x` prefix.
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// Parse the canonical `0x`-prefixed hex form.
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(ElementId)
    }

    /// Lenient decoding for values written before the hex encoding became
    /// canonical: accepts the canonical form, a bare decimal string, or a
    /// plain integer. Returns `None` for anything unparseable so callers
    /// can leave the original value in place.
    pub fn from_legacy_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_u64().map(ElementId),
            serde_json::Value::String(s) => {
                if s.starts_with("0x") || s.starts_with("0X") {
                    Self::from_hex(s)
                } else {
                    s.parse::<u64>().ok().map(ElementId)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Interned class identifier, assigned per connection in registration
/// order. Never reused within a connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        ClassId(raw)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Identifier of a model, the named container that scopes elements and
/// owns their range index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(u64);

impl ModelId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        ModelId(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_round_trip() {
        let id = ElementId::new(123);
        assert_eq!(id.to_hex(), "0x7b");
        assert_eq!(ElementId::from_hex("0x7b"), Some(id));
        assert_eq!(ElementId::from_hex("0X7B"), Some(id));
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert_eq!(ElementId::from_hex("7b"), None);
        assert_eq!(ElementId::from_hex("0x"), None);
        assert_eq!(ElementId::from_hex("0xzz"), None);
        assert_eq!(ElementId::from_hex(""), None);
    }

    #[test]
    fn invalid_sentinel() {
        assert!(!ElementId::INVALID.is_valid());
        assert!(ElementId::new(1).is_valid());
    }

    #[test]
    fn legacy_json_number() {
        assert_eq!(
            ElementId::from_legacy_json(&json!(123)),
            Some(ElementId::new(123))
        );
    }

    #[test]
    fn legacy_json_decimal_string() {
        assert_eq!(
            ElementId::from_legacy_json(&json!("123")),
            Some(ElementId::new(123))
        );
    }

    #[test]
    fn legacy_json_canonical_string() {
        assert_eq!(
            ElementId::from_legacy_json(&json!("0x7b")),
            Some(ElementId::new(123))
        );
    }

    #[test]
    fn legacy_json_unparseable() {
        assert_eq!(ElementId::from_legacy_json(&json!("not-an-id")), None);
        assert_eq!(ElementId::from_legacy_json(&json!(-5)), None);
        assert_eq!(ElementId::from_legacy_json(&json!(null)), None);
        assert_eq!(ElementId::from_legacy_json(&json!([1])), None);
    }

    #[test]
    fn display_matches_canonical_form() {
        assert_eq!(ElementId::new(31).to_string(), "0x1f");
    }
}

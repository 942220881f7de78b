//! Cache key derivation.
//!
//! Keys are a pure function of the request identity. The journey-id formats
//! are shared with other readers of the same cache and must not change:
//!
//! - nested:  `journeyId:<externalId>:nested`
//! - flat:    `journeyId:<externalId>`
//! - batch:   `journeyId:<id1>:<id2>:...`
//!
//! Merchant-context keys are opaque: a SHA-256 digest over the three ids,
//! separated by the ASCII unit separator so `("ab", "c")` and `("a", "bc")`
//! never collide.

use journey_core::FlowContext;
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix shared by every journey-id key.
pub const JOURNEY_KEY_PREFIX: &str = "journeyId:";

const CONTEXT_KEY_PREFIX: &str = "flowContext:";
const NESTED_SUFFIX: &str = ":nested";
const BATCH_SEPARATOR: &str = ":";
const CONTEXT_FIELD_SEPARATOR: u8 = 0x1F;

/// Identity of a cacheable read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JourneyCacheKey {
    /// All journeys for a (merchant, tenant, channel).
    Context(FlowContext),
    /// One journey, nested shape.
    Nested(String),
    /// One journey, flattened shape.
    Flat(String),
    /// Several journeys, one flattened list each.
    Batch(Vec<String>),
}

impl JourneyCacheKey {
    pub fn context(merchant_id: &str, tenant_id: &str, channel_id: &str) -> Self {
        Self::Context(FlowContext::new(merchant_id, tenant_id, channel_id))
    }

    pub fn nested(external_id: impl Into<String>) -> Self {
        Self::Nested(external_id.into())
    }

    pub fn flat(external_id: impl Into<String>) -> Self {
        Self::Flat(external_id.into())
    }

    pub fn batch<S: AsRef<str>>(external_ids: &[S]) -> Self {
        Self::Batch(external_ids.iter().map(|s| s.as_ref().to_string()).collect())
    }

    /// Encode to the string stored in the cache.
    pub fn encode(&self) -> String {
        match self {
            Self::Context(ctx) => context_key(&ctx.merchant_id, &ctx.tenant_id, &ctx.channel_id),
            Self::Nested(id) => format!("{JOURNEY_KEY_PREFIX}{id}{NESTED_SUFFIX}"),
            Self::Flat(id) => format!("{JOURNEY_KEY_PREFIX}{id}"),
            Self::Batch(ids) => format!("{JOURNEY_KEY_PREFIX}{}", ids.join(BATCH_SEPARATOR)),
        }
    }
}

impl fmt::Display for JourneyCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Opaque key for the merchant-context read.
pub fn context_key(merchant_id: &str, tenant_id: &str, channel_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(merchant_id.as_bytes());
    hasher.update([CONTEXT_FIELD_SEPARATOR]);
    hasher.update(tenant_id.as_bytes());
    hasher.update([CONTEXT_FIELD_SEPARATOR]);
    hasher.update(channel_id.as_bytes());
    format!("{CONTEXT_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_key_format() {
        assert_eq!(JourneyCacheKey::nested("J1").encode(), "journeyId:J1:nested");
    }

    #[test]
    fn test_flat_key_format() {
        assert_eq!(JourneyCacheKey::flat("J1").encode(), "journeyId:J1");
    }

    #[test]
    fn test_batch_key_format() {
        let key = JourneyCacheKey::batch(&["A", "B", "C"]);
        assert_eq!(key.encode(), "journeyId:A:B:C");
    }

    #[test]
    fn test_batch_key_preserves_order() {
        let abc = JourneyCacheKey::batch(&["A", "B", "C"]).encode();
        let cab = JourneyCacheKey::batch(&["C", "A", "B"]).encode();
        assert_ne!(abc, cab);
    }

    #[test]
    fn test_context_key_is_opaque_and_stable() {
        let key = context_key("merchantX", "tenantY", "channelZ");
        assert!(key.starts_with("flowContext:"));
        assert_eq!(key.len(), "flowContext:".len() + 64);
        assert!(!key.contains("merchantX"));
        assert_eq!(key, context_key("merchantX", "tenantY", "channelZ"));
    }

    #[test]
    fn test_context_key_field_boundaries() {
        assert_ne!(context_key("ab", "c", "d"), context_key("a", "bc", "d"));
        assert_ne!(context_key("a", "b", "cd"), context_key("a", "bc", "d"));
    }

    #[test]
    fn test_display_matches_encode() {
        let key = JourneyCacheKey::context("m", "t", "c");
        assert_eq!(key.to_string(), key.encode());
    }
}

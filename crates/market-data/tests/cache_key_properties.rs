//! Property-based tests for cache key derivation.
//!
//! Requests that ask for the same data must land on the same cache entry and
//! the same in-flight call, whatever the order or casing of their ids.

use cryptofolio_market_data::{
    normalize_ids, slugify_coin_id, CacheKey, MarketOrder, MarketsQuery, MAX_PAGE_SIZE,
};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

/// Coin-id-like strings, with occasional padding and upper case.
fn arb_id() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9-]{0,12}", any::<bool>(), any::<bool>()).prop_map(|(id, upper, pad)| {
        let id = if upper { id.to_uppercase() } else { id };
        if pad {
            format!("  {} ", id)
        } else {
            id
        }
    })
}

fn arb_order() -> impl Strategy<Value = MarketOrder> {
    prop_oneof![
        Just(MarketOrder::MarketCapAsc),
        Just(MarketOrder::MarketCapDesc),
        Just(MarketOrder::VolumeAsc),
        Just(MarketOrder::VolumeDesc),
        Just(MarketOrder::IdAsc),
        Just(MarketOrder::IdDesc),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Shuffled, re-cased and duplicated id lists map to one key.
    #[test]
    fn prop_prices_key_ignores_order_case_and_duplicates(
        ids in proptest::collection::vec(arb_id(), 1..20),
        seed in any::<u64>(),
    ) {
        let mut shuffled = ids.clone();
        let len = shuffled.len();
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();
        shuffled.push(ids[0].to_uppercase());

        prop_assert_eq!(CacheKey::prices(&ids), CacheKey::prices(&shuffled));
    }

    /// Normalized ids are sorted, unique, trimmed and lowercase.
    #[test]
    fn prop_normalized_ids_are_canonical(
        ids in proptest::collection::vec(arb_id(), 0..20)
    ) {
        let normalized = normalize_ids(&ids);

        prop_assert!(normalized.windows(2).all(|w| w[0] < w[1]));
        for id in &normalized {
            prop_assert_eq!(id.trim(), id.as_str());
            prop_assert_eq!(id.to_lowercase(), id.clone());
            prop_assert!(!id.is_empty());
        }
    }

    /// Distinct queries never share a key.
    #[test]
    fn prop_markets_key_is_injective(
        page_a in 1u32..100, page_b in 1u32..100,
        size_a in 1u32..=MAX_PAGE_SIZE, size_b in 1u32..=MAX_PAGE_SIZE,
        order_a in arb_order(), order_b in arb_order(),
    ) {
        let a = MarketsQuery::new(page_a, size_a, order_a);
        let b = MarketsQuery::new(page_b, size_b, order_b);

        prop_assert_eq!(a == b, CacheKey::markets(&a) == CacheKey::markets(&b));
    }

    /// Slugs only contain lowercase ascii letters, digits and single dashes,
    /// and are already in slug form.
    #[test]
    fn prop_slugs_are_url_safe(name in "\\PC{0,40}") {
        let slug = slugify_coin_id(&name);

        prop_assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.contains("--"));
        prop_assert_eq!(slugify_coin_id(&slug), slug);
    }
}

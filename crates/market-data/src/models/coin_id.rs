//! Coin id derivation for portfolio entries that were saved without one.

use unicode_normalization::UnicodeNormalization;

/// Turn a coin name or symbol into a provider coin id slug.
///
/// Lowercases, strips diacritics, drops anything outside `[a-z0-9 -]`, then
/// trims and turns each run of whitespace and dashes into a single dash.
/// Dashes at the edges of the input survive.
///
/// ```
/// use cryptofolio_market_data::slugify_coin_id;
///
/// assert_eq!(slugify_coin_id("Shiba Inu"), "shiba-inu");
/// assert_eq!(slugify_coin_id("  Café  Coin!! "), "cafe-coin");
/// assert_eq!(slugify_coin_id("-x-"), "-x-");
/// ```
pub fn slugify_coin_id(name_or_symbol: &str) -> String {
    let kept: String = name_or_symbol
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-'
        })
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for c in kept.trim().chars() {
        let c = if c.is_whitespace() { '-' } else { c };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

/// Combining diacritical marks left behind by canonical decomposition.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Pick the coin id for a portfolio entry: the stored id when present,
/// otherwise the slug of its name, otherwise the slug of its symbol.
pub fn resolve_coin_id(explicit: Option<&str>, name: &str, symbol: &str) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| Some(slugify_coin_id(name)).filter(|s| !s.is_empty()))
        .or_else(|| Some(slugify_coin_id(symbol)).filter(|s| !s.is_empty()))
}

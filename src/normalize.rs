//! Comparison keys for free-form city strings.

/// Drops everything from the first comma onward ("Toronto, Canada" -> "Toronto").
pub fn strip_suffix(raw: &str) -> &str {
    raw.split(',').next().unwrap_or("").trim()
}

/// "Prefix before the first comma, lower-cased". Applied to both the query and
/// the stored key during the fuzzy pass.
pub fn reduce(raw: &str) -> String {
    strip_suffix(raw.trim()).to_lowercase()
}

/// Candidate keys to try against the gazetteer, in priority order:
///
/// 1. the trimmed input
/// 2. the trimmed input without its country/region suffix
/// 3. lower-case of 1
/// 4. lower-case of 2
///
/// Never fails. Blank input yields empty keys, which match nothing.
pub fn derive_keys(raw: &str) -> [String; 4] {
    let trimmed = raw.trim();
    let city_only = strip_suffix(trimmed);
    [
        trimmed.to_string(),
        city_only.to_string(),
        trimmed.to_lowercase(),
        city_only.to_lowercase(),
    ]
}

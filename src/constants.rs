// Defaults loaded from the environment. CLI flags override these in main.rs.

use std::env;

/// Value shipped in sample `.env` files; treated the same as no key at all.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Zoom level the map opens at once a city is located.
pub const DEFAULT_MAP_ZOOM: u8 = 12;

lazy_static::lazy_static! {
    pub static ref GEOCODE_URL: String = env::var("AVOCADO_GEOCODE_URL").unwrap_or_else(|_| "https://maps.googleapis.com".to_string());
    pub static ref GEOCODE_TIMEOUT_SECS: u64 = env::var("AVOCADO_GEOCODE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8);
    pub static ref TEMPLATES_DIR: String = env::var("AVOCADO_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());
    pub static ref STATIC_DIR: String = env::var("AVOCADO_STATIC_DIR").unwrap_or_else(|_| "static".to_string());
}

/// Turns a raw credential value into `Some(key)` only when it is usable.
///
/// Missing, blank and placeholder keys all mean gazetteer-only mode.
pub fn usable_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

//! Canonicalisation of raw WebMD URLs found in model output.

use regex::Regex;
use tracing::{debug, instrument};

use crate::probe::UrlProber;
use crate::taxonomy::validate_structure;

lazy_static::lazy_static! {
    static ref PARENTHESIZED: Regex = Regex::new(r"\([^)]*\)").expect("parenthesized regex is valid");
    static ref SLIDESHOW_SEGMENT: Regex = Regex::new(r"/ss/slideshow-[^/]+").expect("slideshow regex is valid");
}

/// Pure normalisation: drop parenthesised text, query and fragment, trailing
/// punctuation and a leading `@`.
pub fn clean_url(raw: &str) -> String {
    let without_parens = PARENTHESIZED.replace_all(raw, "");
    let without_query = without_parens
        .split('?')
        .next()
        .unwrap_or_default()
        .split('#')
        .next()
        .unwrap_or_default();
    let trimmed = without_query
        .trim_end_matches(|c: char| ".,;:!?)".contains(c) || c.is_whitespace())
        .trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_string()
}

/// Clean `raw`, check it against the site layout, then probe it.
///
/// When the cleaned URL is not accessible, two degraded forms are tried in
/// turn: without `/default.htm`, then without a `/ss/slideshow-...` segment.
/// A degraded form must still fit the site layout, so every returned URL
/// formats to itself. Each attempt is a separate probe, so this costs up to
/// three round-trips.
#[instrument(skip(prober))]
pub async fn format_url(raw: &str, prober: &dyn UrlProber) -> Option<String> {
    let clean = clean_url(raw);

    if !validate_structure(&clean) {
        debug!(%clean, "Rejected by site structure");
        return None;
    }

    if prober.is_accessible(&clean).await {
        return Some(clean);
    }

    let fallbacks = [
        clean.replacen("/default.htm", "", 1),
        SLIDESHOW_SEGMENT.replacen(&clean, 1, "").into_owned(),
    ];
    for candidate in fallbacks {
        if !validate_structure(&candidate) {
            debug!(%candidate, "Fallback rejected by site structure");
            continue;
        }
        if prober.is_accessible(&candidate).await {
            return Some(candidate);
        }
    }

    debug!(%clean, "No accessible form found");
    None
}

// Process-wide settings, loaded from the environment (after dotenvy has run).

use std::env;

/// Canonical prefix of the external content site.
pub const SITE_ROOT: &str = "https://www.webmd.com";

/// Browser-like identification sent with sitemap fetches and probes.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Returned to the caller whenever the chat pipeline fails.
pub const CHAT_APOLOGY: &str =
    "I'm having trouble connecting to WebMD's database right now. Please try again later.";

pub const DEFAULT_PORT: u16 = 3000;

lazy_static::lazy_static! {
    // Never logged.
    pub static ref GEMINI_API_KEY: String = env::var("GEMINI_API_KEY").unwrap_or_default();
    pub static ref GEMINI_MODEL: String = env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    pub static ref GEMINI_API_BASE: String = env::var("GEMINI_API_BASE").unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
}

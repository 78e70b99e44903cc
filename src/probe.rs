//! Live accessibility checks for candidate links.

use async_trait::async_trait;
use reqwest::{header, Client};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::constants::BROWSER_USER_AGENT;
use crate::sitemap::SitemapCache;

/// Decides whether a URL may be shown to the user.
///
/// The formatter and the link injector only talk to this trait, so they can be
/// exercised without network access.
#[async_trait]
pub trait UrlProber: Send + Sync {
    async fn is_accessible(&self, url: &str) -> bool;
}

/// Sitemap gate followed by a HEAD request against the live page.
///
/// Results are not cached; every call that passes the sitemap gate costs one
/// round-trip. Any transport error counts as inaccessible.
pub struct HttpProber {
    client: Client,
    sitemap: Arc<SitemapCache>,
}

impl HttpProber {
    pub fn new(client: Client, sitemap: Arc<SitemapCache>) -> Self {
        Self { client, sitemap }
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    #[instrument(skip(self))]
    async fn is_accessible(&self, url: &str) -> bool {
        if !self.sitemap.is_known(url) {
            debug!("Not in sitemap");
            return false;
        }

        let response = match self
            .client
            .head(url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Probe failed: {}", e);
                return false;
            }
        };

        let status = response.status();
        if !status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            debug!(%status, "Probe returned non-success status");
            return false;
        }

        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|content_type| content_type.contains("text/html"))
            .unwrap_or(false)
    }
}

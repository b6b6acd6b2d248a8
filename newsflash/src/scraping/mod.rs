//! Source adapters: one per external news site, each encapsulating that
//! site's markup heuristics behind the [`NewsSource`] trait.

use anyhow::Result;

use crate::article::Article;

pub mod bbc;
pub mod guardian;

/// Upper bound on candidates a single source yields per cycle. Bounds both
/// parse cost and notification volume.
pub const MAX_CANDIDATES: usize = 6;

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Label appended to notification messages and used in logs.
    fn name(&self) -> &str;

    /// Fetch the source's front page and extract candidate articles.
    /// A page whose expected structure is absent yields `Ok` with an empty
    /// list; only transport-level failure is an error.
    async fn fetch_candidates(&self) -> Result<Vec<Article>>;
}

/// The built-in source set, in processing order.
pub fn default_sources(client: reqwest::Client, max_attempts: u32) -> Vec<Box<dyn NewsSource>> {
    vec![
        Box::new(bbc::Bbc::new(client.clone(), max_attempts)),
        Box::new(guardian::Guardian::new(client, max_attempts)),
    ]
}

/// Rewrite a root-relative href to an absolute URL on the source's origin.
/// Anything else (absolute, cross-domain, fragment, empty) is rejected.
pub(crate) fn absolutize(origin: &str, href: &str) -> Option<String> {
    if href.starts_with('/') {
        Some(format!("{}{}", origin, href))
    } else {
        None
    }
}

//! The Guardian front-page scraper.
//!
//! Unlike BBC, headlines live in the link's `aria-label` attribute rather
//! than in a child element; the rest of the layout follows the same
//! class-heuristic approach.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{absolutize, NewsSource, MAX_CANDIDATES};
use crate::article::{self, Article};
use crate::ingestion;

pub const ORIGIN: &str = "https://www.theguardian.com";

const GRID_SELECTOR: &str = "ul.dcr-68r5kg";
const SUBJECT_SELECTOR: &str = "div.dcr-1cc5b8d";
const TIME_SELECTOR: &str = "time";

pub struct Guardian {
    client: reqwest::Client,
    max_attempts: u32,
    origin: String,
}

impl Guardian {
    pub fn new(client: reqwest::Client, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts,
            origin: ORIGIN.to_string(),
        }
    }

    /// Point the adapter at a different host (tests use a local mock server).
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    fn front_page(&self) -> String {
        format!("{}/uk", self.origin)
    }
}

#[async_trait::async_trait]
impl NewsSource for Guardian {
    fn name(&self) -> &str {
        "The Guardian"
    }

    async fn fetch_candidates(&self) -> Result<Vec<Article>> {
        let html = ingestion::fetch_page(&self.client, &self.front_page(), self.max_attempts).await?;
        Ok(extract(&html, &self.origin))
    }
}

/// Pull candidate articles out of the front-page markup.
pub fn extract(html: &str, origin: &str) -> Vec<Article> {
    let document = Html::parse_document(html);
    let grid = Selector::parse(GRID_SELECTOR).unwrap();
    let item = Selector::parse("li").unwrap();

    // Only the first matching grid holds the latest articles
    let Some(list) = document.select(&grid).next() else {
        warn!(source = "The Guardian", "article grid not found on front page");
        return Vec::new();
    };

    let mut articles = Vec::new();
    for li in list.select(&item) {
        if let Some(candidate) = extract_item(li, origin) {
            articles.push(candidate);
            if articles.len() >= MAX_CANDIDATES {
                break;
            }
        }
    }
    articles
}

fn extract_item(li: ElementRef, origin: &str) -> Option<Article> {
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let subject_sel = Selector::parse(SUBJECT_SELECTOR).unwrap();
    let time_sel = Selector::parse(TIME_SELECTOR).unwrap();

    let anchor = li.select(&anchor_sel).next()?;
    let href = anchor.value().attr("href")?;
    let link = absolutize(origin, href)?;

    let title = anchor
        .value()
        .attr("aria-label")
        .map(str::to_string)
        .unwrap_or_else(|| article::NO_TITLE.to_string());
    // Untitled candidates never reach persistence
    if title == article::NO_TITLE {
        return None;
    }

    let subject = li
        .select(&subject_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_else(|| article::UNKNOWN_SUBJECT.to_string());

    let publication_time = li
        .select(&time_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_else(|| article::NO_TIME.to_string());
    let publication_time = article::normalize_publication_time(&publication_time);

    Some(Article::new(title, subject, publication_time, link))
}

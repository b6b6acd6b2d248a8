//! BBC News front-page scraper.
//!
//! Extraction leans on the site's generated CSS class names, which are
//! stable between redesigns but not guaranteed. A missing container means
//! "no candidates this cycle", never a hard failure.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{absolutize, NewsSource, MAX_CANDIDATES};
use crate::article::{self, Article};
use crate::ingestion;

pub const ORIGIN: &str = "https://www.bbc.co.uk";

const GRID_SELECTOR: &str = "ul.ssrcss-y8stko-Grid.e12imr580";
const TITLE_SELECTOR: &str = "p";
const SUBJECT_SELECTOR: &str = "span.ssrcss-1pvwv4b-MetadataSnippet.e4wm5bw3";
const TIME_SELECTOR: &str = "span.visually-hidden.ssrcss-1f39n02-VisuallyHidden.e16en2lz0";

pub struct Bbc {
    client: reqwest::Client,
    max_attempts: u32,
    origin: String,
}

impl Bbc {
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
        format!("{}/news/", self.origin)
    }
}

#[async_trait::async_trait]
impl NewsSource for Bbc {
    fn name(&self) -> &str {
        "BBC"
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
        warn!(source = "BBC", "article grid not found on front page");
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
    let title_sel = Selector::parse(TITLE_SELECTOR).unwrap();
    let subject_sel = Selector::parse(SUBJECT_SELECTOR).unwrap();
    let time_sel = Selector::parse(TIME_SELECTOR).unwrap();

    let href = li.select(&anchor_sel).next()?.value().attr("href")?;
    let link = absolutize(origin, href)?;

    let title = li
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>())
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

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, title: &str, subject: &str, time: &str) -> String {
        format!(
            r#"<li>
                <a href="{href}"><p>{title}</p></a>
                <span class="ssrcss-1pvwv4b-MetadataSnippet e4wm5bw3">{subject}</span>
                <span class="visually-hidden ssrcss-1f39n02-VisuallyHidden e16en2lz0">{time}</span>
            </li>"#
        )
    }

    fn page(items: &str) -> String {
        format!(
            r#"<html><body><ul class="ssrcss-y8stko-Grid e12imr580">{items}</ul></body></html>"#
        )
    }

    #[test]
    fn extracts_full_candidates() {
        let html = page(&item("/news/uk-100", "Budget passes", "Politics", "2 hours ago"));
        let articles = extract(&html, ORIGIN);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Budget passes");
        assert_eq!(articles[0].subject, "Politics");
        assert_eq!(articles[0].publication_time, "2 hours ago");
        assert_eq!(articles[0].link, "https://www.bbc.co.uk/news/uk-100");
    }

    #[test]
    fn missing_fields_become_sentinels() {
        let html = page(
            r#"<li><a href="/news/uk-101"><p>Quiet day</p></a></li>"#,
        );
        let articles = extract(&html, ORIGIN);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].subject, "Unknown");
        assert_eq!(articles[0].publication_time, "No Time");
    }

    #[test]
    fn untitled_candidates_are_dropped() {
        let html = page(r#"<li><a href="/news/uk-102"></a></li>"#);
        assert!(extract(&html, ORIGIN).is_empty());
    }

    #[test]
    fn live_coverage_time_is_normalized() {
        let html = page(&item("/news/uk-103", "Storm latest", "Weather", ".Live reporting"));
        let articles = extract(&html, ORIGIN);
        assert_eq!(articles[0].publication_time, "Live");
    }

    #[test]
    fn non_root_relative_links_are_rejected() {
        let mut items = item("https://other.example/x", "Elsewhere", "World", "1 hour ago");
        items.push_str(&item("/news/uk-104", "Local story", "UK", "1 hour ago"));
        let html = page(&items);
        let articles = extract(&html, ORIGIN);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "https://www.bbc.co.uk/news/uk-104");
    }

    #[test]
    fn extraction_is_bounded() {
        let mut items = String::new();
        for i in 0..10 {
            items.push_str(&item(
                &format!("/news/uk-{i}"),
                &format!("Story {i}"),
                "UK",
                "1 hour ago",
            ));
        }
        let articles = extract(&page(&items), ORIGIN);
        assert_eq!(articles.len(), MAX_CANDIDATES);
    }

    #[test]
    fn missing_grid_yields_no_candidates() {
        let html = "<html><body><ul class=\"other\"><li></li></ul></body></html>";
        assert!(extract(html, ORIGIN).is_empty());
    }

    #[test]
    fn only_first_grid_is_scanned() {
        let first = page(&item("/news/uk-1", "From first", "UK", "now"));
        // Append a second grid with a different story
        let html = first.replace(
            "</body>",
            &format!(
                r#"<ul class="ssrcss-y8stko-Grid e12imr580">{}</ul></body>"#,
                item("/news/uk-2", "From second", "UK", "now")
            ),
        );
        let articles = extract(&html, ORIGIN);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "From first");
    }
}

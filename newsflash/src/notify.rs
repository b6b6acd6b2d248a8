//! Notification routing: decides who gets told about which new article and
//! renders the MarkdownV2 message for each delivery.

use crate::article::{self, Article};
use crate::subscribers::Subscriber;
use crate::telegram::escape_markdown_v2;

/// Minimum total candidates a source must have yielded this cycle before its
/// batch is notified. Deliberately keyed on the fetched count rather than the
/// new count: a thin scrape is treated as a partial page and stays silent
/// even when some of its items are new.
pub const MIN_BATCH_CANDIDATES: usize = 3;

/// One message queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub chat_id: i64,
    pub text: String,
}

/// Whether a source's batch is eligible for notification this cycle.
pub fn batch_passes_gate(total_candidates: usize) -> bool {
    total_candidates >= MIN_BATCH_CANDIDATES
}

/// Cross a source's newly inserted articles with the subscriber list.
///
/// `total_candidates` is the full fetched count for the source this cycle,
/// before dedup. Topic matching compares the raw subject string against each
/// subscriber's topic set; escaping is applied afterwards, for rendering
/// only. Placeholder-titled articles are never delivered.
pub fn plan_deliveries(
    source_label: &str,
    total_candidates: usize,
    new_articles: &[Article],
    subscribers: &[Subscriber],
) -> Vec<Delivery> {
    if !batch_passes_gate(total_candidates) {
        return Vec::new();
    }

    let mut deliveries = Vec::new();
    for art in new_articles {
        if article::is_title_placeholder(&art.title) {
            continue;
        }
        let body = format_message(art, source_label);
        for subscriber in subscribers {
            if subscriber.topics.contains(&art.subject) {
                let text = format!("{}\n{}", greeting(&subscriber.display_name), body);
                deliveries.push(Delivery {
                    chat_id: subscriber.chat_id,
                    text,
                });
            }
        }
    }
    deliveries
}

/// The personalized line that precedes every message body.
fn greeting(display_name: &str) -> String {
    format!("{}, this article may be interesting for you\\.", display_name)
}

/// The message body shared by every recipient of one article: emphasized
/// title, subject and time lines, a link directive, and the source label.
pub fn format_message(art: &Article, source_label: &str) -> String {
    format!(
        "*{}*\n_Subject: {}_\n_Publication time: {}_\n[Read Article]({})\n{}",
        escape_markdown_v2(&art.title),
        escape_markdown_v2(&art.subject),
        escape_markdown_v2(&art.publication_time),
        escape_markdown_v2(&art.link),
        source_label,
    )
}

//! Ordered link sequences for a subsession.

use crate::page::PageUrl;
use crate::subsession::TimedEvent;

/// Which representation of each URL to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkColumns {
    /// The full URL as read.
    Url,
    /// Only `host[:port]`.
    Netloc,
}

impl LinkColumns {
    fn render(self, url: Option<&PageUrl>) -> Option<String> {
        match self {
            Self::Url => url.map(|u| u.as_str().to_string()),
            Self::Netloc => url.and_then(PageUrl::netloc).map(str::to_string),
        }
    }
}

/// Flattens a subsession into `[referrer_1, target_1, referrer_2, target_2, ...]`.
///
/// Rows at the same instant as their predecessor are almost always automated
/// redirects, so only the first zero-gap row is kept. A missing referrer
/// stays `None`.
pub fn build_link_sequence(events: &[TimedEvent], columns: LinkColumns) -> Vec<Option<String>> {
    let mut seen_zero_gap = false;
    events
        .iter()
        .filter(|timed| {
            if !timed.click_gap.is_zero() {
                return true;
            }
            !std::mem::replace(&mut seen_zero_gap, true)
        })
        .flat_map(|timed| {
            [
                columns.render(timed.event.referrer_url.as_ref()),
                columns.render(Some(&timed.event.target_url)),
            ]
        })
        .collect()
}

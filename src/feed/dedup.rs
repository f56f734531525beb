//! Deduplication of feed entries against stored items.
//!
//! Storage-side deduplication is keyed by (user, source, url): an entry is
//! new for a user when no row with the same URL exists for that user and
//! source. Display-side deduplication collapses rows that share
//! (title, url, user) and is applied after reads, never to storage.

use std::collections::HashSet;

use super::types::{CandidateItem, Item, ParsedEntry};

/// Turn parsed entries into storable candidates.
///
/// Entries without a link are dropped. When a feed lists the same link more
/// than once only the first occurrence is kept.
pub fn candidates(entries: Vec<ParsedEntry>) -> Vec<CandidateItem> {
    let mut seen = HashSet::new();

    entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.link?;
            if !seen.insert(url.clone()) {
                return None;
            }
            Some(CandidateItem {
                title: entry.title,
                url,
                postdate: entry.publish_date,
                description: entry.content,
            })
        })
        .collect()
}

/// Keep the candidates whose URL is not in `existing`, preserving order.
pub fn filter_new(candidates: &[CandidateItem], existing: &HashSet<String>) -> Vec<CandidateItem> {
    candidates
        .iter()
        .filter(|c| !existing.contains(&c.url))
        .cloned()
        .collect()
}

/// Collapse items sharing (title, url, user), keeping the first of each group.
pub fn dedupe_for_display(items: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter(|item| seen.insert((item.title.clone(), item.url.clone(), item.user_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(title: &str, link: Option<&str>) -> ParsedEntry {
        ParsedEntry {
            title: title.to_string(),
            link: link.map(str::to_string),
            publish_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            content: None,
        }
    }

    fn item(id: i64, title: &str, url: &str, user_id: i64) -> Item {
        Item {
            id,
            title: title.to_string(),
            url: url.to_string(),
            description: None,
            postdate: Utc::now(),
            slug: format!("slug{id}"),
            user_id,
            source_id: 1,
        }
    }

    #[test]
    fn test_candidates_drop_linkless_entries() {
        let result = candidates(vec![
            entry("A", Some("https://example.com/a")),
            entry("No link", None),
            entry("B", Some("https://example.com/b")),
        ]);

        let urls: Vec<&str> = result.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_candidates_collapse_repeated_links() {
        let result = candidates(vec![
            entry("First", Some("https://example.com/a")),
            entry("Second", Some("https://example.com/a")),
        ]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "First");
    }

    #[test]
    fn test_filter_new() {
        let all = candidates(vec![
            entry("A", Some("https://example.com/a")),
            entry("B", Some("https://example.com/b")),
            entry("C", Some("https://example.com/c")),
        ]);
        let existing: HashSet<String> = ["https://example.com/b".to_string()].into();

        let fresh = filter_new(&all, &existing);
        let titles: Vec<&str> = fresh.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);

        assert_eq!(filter_new(&all, &HashSet::new()).len(), 3);
    }

    #[test]
    fn test_dedupe_for_display() {
        let items = vec![
            item(1, "Post", "https://example.com/p", 1),
            item(2, "Post", "https://example.com/p", 1),
            item(3, "Post", "https://example.com/p", 2),
            item(4, "Other", "https://example.com/p", 1),
        ];

        let result = dedupe_for_display(items);
        let ids: Vec<i64> = result.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_dedupe_for_display_is_idempotent() {
        let items = vec![
            item(1, "Post", "https://example.com/p", 1),
            item(2, "Post", "https://example.com/p", 1),
        ];

        let once = dedupe_for_display(items);
        let twice = dedupe_for_display(once.clone());
        let once_ids: Vec<i64> = once.iter().map(|i| i.id).collect();
        let twice_ids: Vec<i64> = twice.iter().map(|i| i.id).collect();
        assert_eq!(once_ids, twice_ids);
    }
}

// src/intel/parse.rs
//! Turn the model's text answer into feed items.

use serde_json::Value;

use crate::feed::normalize::normalize_item;
use crate::feed::ResultItem;

/// Outcome of reading one model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    pub items: Vec<ResultItem>,
    /// Array elements that could not be read as an item and were skipped.
    pub rejected: usize,
    /// True when non-empty text yielded no usable item: not an array at all,
    /// or an array whose every element was rejected.
    pub degraded: bool,
}

impl ParsedBatch {
    fn empty(degraded: bool) -> Self {
        Self {
            items: Vec::new(),
            rejected: 0,
            degraded,
        }
    }
}

/// Parse the answer as a JSON array of items.
///
/// Empty text is zero items. Prose or code fences around the array are
/// tolerated by retrying on the outermost `[...]` slice. Elements are read
/// one at a time, so a single off-schema entry only costs itself.
pub fn parse_items(text: &str) -> ParsedBatch {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedBatch::empty(false);
    }

    let parsed = serde_json::from_str::<Vec<Value>>(trimmed).or_else(|first| {
        match outer_array(trimmed) {
            Some(slice) if slice.len() < trimmed.len() => serde_json::from_str::<Vec<Value>>(slice),
            _ => Err(first),
        }
    });

    let raw = match parsed {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, len = trimmed.len(), "model answer is not an item array");
            return ParsedBatch::empty(true);
        }
    };

    let total = raw.len();
    let mut items = Vec::with_capacity(total);
    let mut rejected = 0;
    for (idx, v) in raw.into_iter().enumerate() {
        match serde_json::from_value::<ResultItem>(v) {
            Ok(mut it) => {
                normalize_item(&mut it);
                it.is_new = false;
                items.push(it);
            }
            Err(e) => {
                rejected += 1;
                tracing::debug!(index = idx, error = %e, "skipping unreadable item");
            }
        }
    }
    if rejected > 0 {
        tracing::warn!(rejected, total, "model answer had unreadable items");
    }

    ParsedBatch {
        degraded: total > 0 && items.is_empty(),
        items,
        rejected,
    }
}

fn outer_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"[{"id":"1","title":"T","description":"D","source":"S","publishedAt":"Just now","location":{"name":"Delhi, India","lat":28.61,"lng":77.2}}]"#;

    #[test]
    fn plain_array_parses() {
        let b = parse_items(ONE);
        assert!(!b.degraded);
        assert_eq!(b.items.len(), 1);
        assert_eq!(b.items[0].location.as_ref().unwrap().name, "Delhi, India");
    }

    #[test]
    fn fenced_array_parses() {
        let text = format!("Here you go:\n```json\n{ONE}\n```\n");
        let b = parse_items(&text);
        assert!(!b.degraded);
        assert_eq!(b.items.len(), 1);
    }

    #[test]
    fn empty_is_zero_items_not_degraded() {
        let b = parse_items("   \n");
        assert!(b.items.is_empty());
        assert!(!b.degraded);
    }

    #[test]
    fn garbage_degrades_to_empty() {
        for text in ["not json", "[{\"id\": 1,", "{\"id\":\"1\"}", "[1, 2]"] {
            let b = parse_items(text);
            assert!(b.items.is_empty(), "{text}");
            assert!(b.degraded, "{text}");
        }
    }

    #[test]
    fn one_bad_item_does_not_sink_the_batch() {
        let text = r#"[
            {"id":"1","title":"Good","description":"D","source":"S","publishedAt":"now"},
            {"id":"2","title":"Cased","description":"D","source":"S","publishedAt":"now",
             "factCheck":{"status":"Verified","score":80}},
            {"id":"3","title":"Null kw","description":"D","source":"S","publishedAt":"now","keywords":null},
            {"id":"4","description":"no title","source":"S","publishedAt":"now"},
            "stray string"
        ]"#;
        let b = parse_items(text);
        assert!(!b.degraded);
        assert_eq!(b.rejected, 2);
        let ids: Vec<&str> = b.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_array_is_not_degraded() {
        let b = parse_items("[]");
        assert!(b.items.is_empty());
        assert!(!b.degraded);
    }

    #[test]
    fn upstream_is_new_is_ignored() {
        let text = r#"[{"id":"1","title":"T","description":"D","source":"S","publishedAt":"1h ago","isNew":true}]"#;
        let b = parse_items(text);
        assert!(!b.items[0].is_new);
    }
}

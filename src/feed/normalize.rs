// src/feed/normalize.rs
//! Text cleanup applied to model output before it reaches a session.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::feed::types::ResultItem;

const MAX_TITLE_CHARS: usize = 300;
const MAX_DESCRIPTION_CHARS: usize = 1500;
const MAX_KEYWORD_CHARS: usize = 60;

/// Seeded stock photo used when an item carries no image.
pub fn placeholder_image_url(id: &str) -> String {
    let seed: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let seed = if seed.is_empty() { "item".to_string() } else { seed };
    format!("https://picsum.photos/seed/{seed}/800/600")
}

/// Decode HTML entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Clean every free-text field of an item in place. Empty keywords are dropped.
pub fn normalize_item(item: &mut ResultItem) {
    item.id = item.id.trim().to_string();
    item.title = normalize_text(&item.title, MAX_TITLE_CHARS);
    item.description = normalize_text(&item.description, MAX_DESCRIPTION_CHARS);
    item.source = normalize_text(&item.source, MAX_TITLE_CHARS);
    item.published_at = normalize_text(&item.published_at, MAX_KEYWORD_CHARS);
    item.url = item.url.trim().to_string();
    item.image_url = item
        .image_url
        .take()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .or_else(|| Some(placeholder_image_url(&item.id)));
    item.keywords = std::mem::take(&mut item.keywords)
        .into_iter()
        .map(|k| normalize_text(&k, MAX_KEYWORD_CHARS))
        .filter(|k| !k.is_empty())
        .collect();
    if let Some(loc) = item.location.as_mut() {
        loc.name = normalize_text(&loc.name, MAX_TITLE_CHARS);
    }
}

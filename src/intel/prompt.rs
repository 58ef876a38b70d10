// src/intel/prompt.rs
//! Prompt text and the structured-output schema sent with every fetch.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Build the single instruction sent to the model for `query`.
pub fn build_prompt(query: &str, now: DateTime<Utc>, min_items: u32) -> String {
    let stamp = now.format("%Y-%m-%d %H:%M:%S UTC");
    format!(
        r#"Fetch the ABSOLUTE LATEST, BREAKING news and real-time social media updates for: "{query}".

CRITICAL: Focus on events that have happened in the last 60 minutes if possible, or the most recent reports available today ({stamp}). Avoid stale news from yesterday unless it is still developing.

IMPORTANT: If the query is in Malayalam or Hindi, or if it's about a region where these languages are spoken, provide the title and description in that specific language (Malayalam or Hindi).

Provide a list of at least {min_items} items.
For each item, include:
- A catchy, headline-style title (in the detected/requested language)
- A brief, engaging description (2-3 sentences, in the detected/requested language)
- A source name (e.g., "Twitter", "BBC News", "Manorama Online", "Dainik Bhaskar")
- A realistic URL to the source
- A high-quality placeholder image URL (use https://picsum.photos/seed/{{id}}/800/600)
- A specific location mentioned in the news (city, country) with its latitude and longitude.
- A relative timestamp (e.g., "2m ago", "1h ago", "Just now").
- 2-3 relevant keywords or tags for this specific item."#
    )
}

/// Declared output schema: an array of feed items.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "description": { "type": "STRING" },
                "url": { "type": "STRING" },
                "imageUrl": { "type": "STRING" },
                "source": { "type": "STRING" },
                "publishedAt": { "type": "STRING" },
                "keywords": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                },
                "location": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "lat": { "type": "NUMBER" },
                        "lng": { "type": "NUMBER" }
                    },
                    "required": ["name", "lat", "lng"]
                }
            },
            "required": ["id", "title", "description", "source", "publishedAt", "location"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prompt_embeds_query_time_and_minimum() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let p = build_prompt("Kerala monsoon", now, 8);
        assert!(p.contains(r#"for: "Kerala monsoon""#));
        assert!(p.contains("2026-03-01 09:30:00 UTC"));
        assert!(p.contains("at least 8 items"));
        assert!(p.contains("Malayalam or Hindi"));
        assert!(p.contains("https://picsum.photos/seed/{id}/800/600"));
    }

    #[test]
    fn schema_requires_location_fields() {
        let s = response_schema();
        assert_eq!(s["type"], "ARRAY");
        let required = s["items"]["required"].as_array().unwrap();
        for f in ["id", "title", "description", "source", "publishedAt", "location"] {
            assert!(required.iter().any(|v| v == f), "missing {f}");
        }
        assert_eq!(
            s["items"]["properties"]["location"]["required"],
            json!(["name", "lat", "lng"])
        );
    }
}

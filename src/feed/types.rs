// src/feed/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One intelligence-feed entry as returned by the model and held by a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
    /// Free-form relative time ("2m ago", "Just now"), not a timestamp.
    pub published_at: String,
    #[serde(default)]
    pub url: String,
    /// Filled with a seeded placeholder during normalization when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "de_keywords")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// An unreadable fact check is dropped rather than rejecting the item.
    #[serde(
        default,
        deserialize_with = "de_fact_check",
        skip_serializing_if = "Option::is_none"
    )]
    pub fact_check: Option<FactCheck>,
    /// Owned by the merge step; whatever upstream sends is overwritten.
    #[serde(default)]
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub name: String,
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    #[serde(rename = "lng", alias = "longitude")]
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FactCheckStatus {
    Verified,
    Unverified,
    Disputed,
    Developing,
}

impl<'de> Deserialize<'de> for FactCheckStatus {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "verified" => Ok(Self::Verified),
            "unverified" => Ok(Self::Unverified),
            "disputed" => Ok(Self::Disputed),
            "developing" => Ok(Self::Developing),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["verified", "unverified", "disputed", "developing"],
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactCheck {
    pub status: FactCheckStatus,
    /// 0..=100; out-of-range model output is clamped.
    #[serde(deserialize_with = "de_score")]
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Per-session search state: what the dashboard renders from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub results: Vec<ResultItem>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Read-only copy of a session handed to views and API consumers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SearchState,
    pub last_updated: Option<DateTime<Utc>>,
    pub live: bool,
}

impl SessionSnapshot {
    pub fn ids(&self) -> Vec<&str> {
        self.state.results.iter().map(|r| r.id.as_str()).collect()
    }
}

// Models occasionally emit numeric ids despite the schema saying STRING.
fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Int(i64),
        Float(f64),
    }
    Ok(match RawId::deserialize(d)? {
        RawId::Str(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

fn de_keywords<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

fn de_fact_check<'de, D>(d: D) -> Result<Option<FactCheck>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

fn de_score<'de, D>(d: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(d)?;
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_are_camel_case_and_location_uses_lat_lng() {
        let v = json!({
            "id": "a1",
            "title": "Headline",
            "description": "Body",
            "source": "BBC News",
            "publishedAt": "2m ago",
            "imageUrl": "https://picsum.photos/seed/a1/800/600",
            "location": { "name": "Kochi, India", "lat": 9.93, "lng": 76.26 }
        });
        let item: ResultItem = serde_json::from_value(v).unwrap();
        assert_eq!(item.published_at, "2m ago");
        assert_eq!(item.url, "");
        assert!(item.keywords.is_empty());
        let loc = item.location.clone().unwrap();
        assert_eq!(loc.latitude, 9.93);

        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["location"]["lng"], json!(76.26));
        assert_eq!(out["isNew"], json!(false));
        assert!(out.get("factCheck").is_none());
    }

    #[test]
    fn numeric_id_and_wild_score_are_tolerated() {
        let v = json!({
            "id": 7,
            "title": "t", "description": "d", "source": "s", "publishedAt": "1h ago",
            "factCheck": { "status": "disputed", "score": 140.2 }
        });
        let item: ResultItem = serde_json::from_value(v).unwrap();
        assert_eq!(item.id, "7");
        let fc = item.fact_check.unwrap();
        assert_eq!(fc.status, FactCheckStatus::Disputed);
        assert_eq!(fc.score, 100);
    }

    #[test]
    fn unknown_fact_check_status_drops_only_the_fact_check() {
        let v = json!({
            "id": "x", "title": "t", "description": "d", "source": "s", "publishedAt": "now",
            "factCheck": { "status": "probably", "score": 10 }
        });
        let item: ResultItem = serde_json::from_value(v).unwrap();
        assert!(item.fact_check.is_none());
        assert_eq!(item.title, "t");
    }

    #[test]
    fn status_case_null_keywords_and_missing_description_are_tolerated() {
        let v = json!({
            "id": "y", "title": "t", "source": "s", "publishedAt": "now",
            "keywords": null,
            "factCheck": { "status": "Verified", "score": 90, "reason": "two wires" }
        });
        let item: ResultItem = serde_json::from_value(v).unwrap();
        assert_eq!(item.description, "");
        assert!(item.keywords.is_empty());
        assert_eq!(item.fact_check.unwrap().status, FactCheckStatus::Verified);
    }

    #[test]
    fn missing_title_is_still_rejected() {
        let v = json!({ "id": "z", "source": "s", "publishedAt": "now" });
        assert!(serde_json::from_value::<ResultItem>(v).is_err());
    }
}

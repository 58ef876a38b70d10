// src/views.rs
//! Read-only views derived from a session's held items: ticker strip,
//! keyword cloud and map markers.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::MapConfig;
use crate::feed::ResultItem;

pub const KEYWORD_LIMIT: usize = 20;
pub const MAP_DEFAULT_CENTER: (f64, f64) = (20.0, 0.0);
pub const MAP_DEFAULT_ZOOM: u8 = 2;
pub const MAP_FIT_PADDING_PX: u32 = 50;

// ---------------- Ticker ----------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub id: String,
    /// "NEW" for items of the latest batch, "LIVE" otherwise.
    pub badge: &'static str,
    pub title: String,
    pub source: String,
}

/// All held items, repeated once so the strip can loop without a seam.
pub fn ticker(items: &[ResultItem]) -> Vec<TickerEntry> {
    if items.is_empty() {
        return Vec::new();
    }
    let once = items.iter().map(|it| TickerEntry {
        id: it.id.clone(),
        badge: if it.is_new { "NEW" } else { "LIVE" },
        title: it.title.clone(),
        source: it.source.clone(),
    });
    once.clone().chain(once).collect()
}

// ---------------- Keyword cloud ----------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordWeight {
    pub word: String,
    pub count: usize,
    /// Link of the first item that mentioned the keyword.
    pub url: String,
    pub size_rem: f64,
    pub opacity: f64,
}

pub fn keyword_size_rem(count: usize) -> f64 {
    (0.8 + count as f64 * 0.2).min(1.5)
}

pub fn keyword_opacity(count: usize) -> f64 {
    (0.4 + count as f64 * 0.15).min(1.0)
}

/// Tally keywords, rank by count (ties keep first-seen order), keep the top 20.
pub fn keyword_cloud(items: &[ResultItem]) -> Vec<KeywordWeight> {
    let mut order: Vec<(String, usize, String)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for it in items {
        for kw in &it.keywords {
            match index.get(kw.as_str()) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(kw.as_str(), order.len());
                    order.push((kw.clone(), 1, it.url.clone()));
                }
            }
        }
    }

    // stable: equal counts stay in first-seen order
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
        .into_iter()
        .take(KEYWORD_LIMIT)
        .map(|(word, count, url)| KeywordWeight {
            word,
            count,
            url,
            size_rem: keyword_size_rem(count),
            opacity: keyword_opacity(count),
        })
        .collect()
}

// ---------------- Map ----------------

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: String,
    pub title: String,
    pub location_name: String,
    pub lat: f64,
    pub lng: f64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub markers: Vec<MapMarker>,
    /// `None` keeps the viewer's previous viewport.
    pub bounds: Option<Bounds>,
    pub fit_padding_px: u32,
    pub default_center: (f64, f64),
    pub default_zoom: u8,
    pub tile_url: String,
    pub attribution: String,
}

pub fn map_markers(items: &[ResultItem]) -> Vec<MapMarker> {
    items
        .iter()
        .filter_map(|it| {
            let loc = it.location.as_ref()?;
            Some(MapMarker {
                id: it.id.clone(),
                title: it.title.clone(),
                location_name: loc.name.clone(),
                lat: loc.latitude,
                lng: loc.longitude,
                url: it.url.clone(),
            })
        })
        .collect()
}

/// Bounding box of the markers; `None` when there is nothing valid to fit.
pub fn fit_bounds(markers: &[MapMarker]) -> Option<Bounds> {
    let mut pts = markers.iter().map(|m| (m.lat, m.lng));
    let (lat0, lng0) = pts.next()?;
    let mut b = Bounds {
        south: lat0,
        west: lng0,
        north: lat0,
        east: lng0,
    };
    for (lat, lng) in pts {
        b.south = b.south.min(lat);
        b.north = b.north.max(lat);
        b.west = b.west.min(lng);
        b.east = b.east.max(lng);
    }
    let valid = [b.south, b.west, b.north, b.east]
        .iter()
        .all(|v| v.is_finite())
        && (-90.0..=90.0).contains(&b.south)
        && (-90.0..=90.0).contains(&b.north);
    if !valid {
        tracing::debug!(markers = markers.len(), "map bounds not fittable; keeping viewport");
        return None;
    }
    Some(b)
}

pub fn map_view(items: &[ResultItem], cfg: &MapConfig) -> MapView {
    let markers = map_markers(items);
    let bounds = fit_bounds(&markers);
    MapView {
        markers,
        bounds,
        fit_padding_px: MAP_FIT_PADDING_PX,
        default_center: MAP_DEFAULT_CENTER,
        default_zoom: MAP_DEFAULT_ZOOM,
        tile_url: cfg.tile_url.clone(),
        attribution: cfg.attribution.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_curves_saturate() {
        assert!((keyword_size_rem(1) - 1.0).abs() < 1e-9);
        assert!((keyword_size_rem(10) - 1.5).abs() < 1e-9);
        assert!((keyword_opacity(2) - 0.7).abs() < 1e-9);
        assert!((keyword_opacity(9) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_of_nothing_is_none() {
        assert!(fit_bounds(&[]).is_none());
    }

    #[test]
    fn nan_coordinates_are_not_fitted() {
        let m = MapMarker {
            id: "1".into(),
            title: String::new(),
            location_name: String::new(),
            lat: f64::NAN,
            lng: 0.0,
            url: String::new(),
        };
        assert!(fit_bounds(&[m]).is_none());
    }
}

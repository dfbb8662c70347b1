//! Defensive mapping from API JSON rows into model structs.
//!
//! The upstream payloads vary per endpoint: photos arrive either as a plain
//! URL string or as a sized object, prices live under several possible paths,
//! and detail responses sometimes nest everything under `product`. A
//! malformed field falls back to an empty/zero/placeholder value; mapping a
//! row never fails.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Candidate, Competitor, Product};

pub const PLACEHOLDER_PHOTO: &str = "https://placehold.co/200x200/cccccc/333333?text=No+Image";

/// Photo size keys tried in order against a sized-object photo value.
const PHOTO_SIZE_KEYS: [&str; 4] = ["MEDIUM", "SMALL", "LARGE", "EXTRA_SMALL"];

/// Price lookup paths tried in order, first hit wins.
const PRICE_PATHS: [&[&str]; 4] = [
    &["price"],
    &["primary_price"],
    &["product", "price"],
    &["variation", "price"],
];

fn get_path<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    Some(cur)
}

/// Accepts a JSON number or a numeric string, like the upstream mixes freely.
fn as_u64_lenient(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Resolve a photo value to a display URL: sized object first (size keys in
/// documented fallback order), then plain string, then the placeholder.
pub fn photo_url(v: Option<&Value>) -> String {
    if let Some(v) = v {
        if let Some(obj) = v.as_object() {
            for key in PHOTO_SIZE_KEYS {
                if let Some(url) = obj.get(key).and_then(Value::as_str) {
                    if !url.is_empty() {
                        return url.to_string();
                    }
                }
            }
        }
        if let Some(url) = v.as_str() {
            if !url.is_empty() {
                return url.to_string();
            }
        }
    }
    PLACEHOLDER_PHOTO.to_string()
}

/// Price with documented path fallbacks; absent or malformed means 0.
pub fn price_of(row: &Value) -> u64 {
    for path in PRICE_PATHS {
        if let Some(price) = get_path(row, path).and_then(as_u64_lenient) {
            return price;
        }
    }
    0
}

/// Identifier from `id` or `product.id`; 0 when absent.
pub fn id_of(row: &Value) -> u64 {
    row.get("id")
        .and_then(as_u64_lenient)
        .or_else(|| get_path(row, &["product", "id"]).and_then(as_u64_lenient))
        .unwrap_or(0)
}

/// Title from `name`, `title`, or `product.title`; empty when absent.
pub fn title_of(row: &Value) -> String {
    row.get("name")
        .and_then(Value::as_str)
        .or_else(|| row.get("title").and_then(Value::as_str))
        .or_else(|| get_path(row, &["product", "title"]).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

pub fn vendor_of(row: &Value) -> u64 {
    get_path(row, &["vendor", "identifier"])
        .or_else(|| get_path(row, &["vendor", "id"]))
        .and_then(as_u64_lenient)
        .unwrap_or(0)
}

fn rating_of(row: &Value) -> Option<(f64, u64)> {
    let rating = row.get("rating")?;
    let average = rating.get("average")?.as_f64()?;
    let count = rating.get("count").and_then(as_u64_lenient).unwrap_or(0);
    Some((average, count))
}

fn photos_of(row: &Value) -> Vec<String> {
    match row.get("photos").and_then(Value::as_array) {
        Some(arr) if !arr.is_empty() => arr.iter().map(|p| photo_url(Some(p))).collect(),
        _ => vec![photo_url(row.get("photo"))],
    }
}

fn created_at_of(row: &Value) -> Option<DateTime<Utc>> {
    let raw = row
        .get("createdAt")
        .or_else(|| row.get("created_at"))?
        .as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build an own-listing row; `listing_base` is the storefront page base.
pub fn product_from_row(row: &Value, listing_base: &str) -> Product {
    let id = id_of(row);
    Product {
        id,
        title: title_of(row),
        price: price_of(row),
        photo: photo_url(row.get("photo")),
        photos: photos_of(row),
        description: row
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        listing_url: format!("{}/p/{}", listing_base.trim_end_matches('/'), id),
        vendor_id: vendor_of(row),
        rating: rating_of(row),
        category: row
            .get("categoryTitle")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at: created_at_of(row),
    }
}

/// Build a similarity-search hit. UI flags start cleared.
pub fn candidate_from_row(row: &Value, listing_base: &str) -> Candidate {
    let id = id_of(row);
    Candidate {
        id,
        title: title_of(row),
        price: price_of(row),
        photo: photo_url(row.get("photo")),
        listing_url: format!("{}/p/{}", listing_base.trim_end_matches('/'), id),
        vendor_id: vendor_of(row),
        is_competitor: false,
        busy: false,
    }
}

/// Build a tracked competitor from a detail response, which may nest fields
/// under `product`.
pub fn competitor_from_detail(detail: &Value, vendor_id: u64, listing_base: &str) -> Competitor {
    let id = id_of(detail);
    Competitor {
        id,
        title: title_of(detail),
        price: price_of(detail),
        photo: photo_url(
            detail
                .get("photo")
                .or_else(|| get_path(detail, &["product", "photo"])),
        ),
        vendor_id,
        listing_url: format!("{}/p/{}", listing_base.trim_end_matches('/'), id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn photo_prefers_medium_then_small_then_large() {
        let sized = json!({"SMALL": "s.jpg", "MEDIUM": "m.jpg", "LARGE": "l.jpg"});
        assert_eq!(photo_url(Some(&sized)), "m.jpg");
        let no_medium = json!({"SMALL": "s.jpg", "LARGE": "l.jpg"});
        assert_eq!(photo_url(Some(&no_medium)), "s.jpg");
        let only_large = json!({"LARGE": "l.jpg"});
        assert_eq!(photo_url(Some(&only_large)), "l.jpg");
    }

    #[test]
    fn photo_accepts_plain_string_and_falls_back_to_placeholder() {
        assert_eq!(photo_url(Some(&json!("direct.jpg"))), "direct.jpg");
        assert_eq!(photo_url(Some(&json!({}))), PLACEHOLDER_PHOTO);
        assert_eq!(photo_url(Some(&json!(""))), PLACEHOLDER_PHOTO);
        assert_eq!(photo_url(None), PLACEHOLDER_PHOTO);
    }

    #[test]
    fn price_walks_fallback_paths_in_order() {
        assert_eq!(price_of(&json!({"price": 1200})), 1200);
        assert_eq!(price_of(&json!({"primary_price": 900})), 900);
        assert_eq!(price_of(&json!({"product": {"price": 700}})), 700);
        assert_eq!(price_of(&json!({"variation": {"price": 500}})), 500);
        // first path wins over later ones
        assert_eq!(price_of(&json!({"price": 10, "primary_price": 20})), 10);
        assert_eq!(price_of(&json!({"title": "no price"})), 0);
    }

    #[test]
    fn price_accepts_numeric_strings() {
        assert_eq!(price_of(&json!({"price": "85000"})), 85_000);
        assert_eq!(price_of(&json!({"price": "not a number"})), 0);
    }

    #[test]
    fn id_and_title_fall_back_to_nested_product() {
        let detail = json!({"product": {"id": "42", "title": "nested"}});
        assert_eq!(id_of(&detail), 42);
        assert_eq!(title_of(&detail), "nested");
        let flat = json!({"id": 7, "title": "flat"});
        assert_eq!(id_of(&flat), 7);
        assert_eq!(title_of(&flat), "flat");
    }

    #[test]
    fn product_row_maps_defensively() {
        let row = json!({
            "id": 11,
            "name": "herbal shampoo",
            "price": 85000,
            "photo": {"SMALL": "s.jpg", "MEDIUM": "m.jpg", "LARGE": "l.jpg"},
            "vendor": {"identifier": 501},
            "rating": {"average": 4.6, "count": 12},
            "categoryTitle": "cosmetics",
            "createdAt": "2023-05-10T08:30:00Z"
        });
        let p = product_from_row(&row, "https://basalam.com");
        assert_eq!(p.id, 11);
        assert_eq!(p.title, "herbal shampoo");
        assert_eq!(p.price, 85_000);
        assert_eq!(p.photo, "m.jpg");
        assert_eq!(p.vendor_id, 501);
        assert_eq!(p.rating, Some((4.6, 12)));
        assert_eq!(p.category, "cosmetics");
        assert_eq!(p.listing_url, "https://basalam.com/p/11");
        assert!(p.created_at.is_some());
    }

    #[test]
    fn sparse_product_row_gets_defaults_not_errors() {
        let p = product_from_row(&json!({"id": 3}), "https://basalam.com");
        assert_eq!(p.title, "");
        assert_eq!(p.price, 0);
        assert_eq!(p.photo, PLACEHOLDER_PHOTO);
        assert_eq!(p.description, "");
        assert!(p.rating.is_none());
        assert!(p.created_at.is_none());
    }

    #[test]
    fn competitor_detail_handles_both_shapes() {
        let flat = json!({"id": 9, "title": "rival", "price": 60000, "photo": "p.jpg"});
        let c = competitor_from_detail(&flat, 77, "https://basalam.com");
        assert_eq!((c.id, c.price, c.vendor_id), (9, 60_000, 77));
        assert_eq!(c.photo, "p.jpg");

        let nested = json!({
            "product": {"id": 10, "title": "rival 2", "price": "55000",
                        "photo": {"SMALL": "n.jpg"}}
        });
        let c = competitor_from_detail(&nested, 78, "https://basalam.com");
        assert_eq!((c.id, c.price), (10, 55_000));
        assert_eq!(c.title, "rival 2");
        assert_eq!(c.photo, "n.jpg");
    }
}

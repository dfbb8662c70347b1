use chrono::{DateTime, Utc};

/// One of the seller's own listings. Read-only cached copy for the session;
/// the catalog service owns the data.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: u64,
    pub title: String,
    /// Smallest currency unit (toman).
    pub price: u64,
    pub photo: String,
    pub photos: Vec<String>,
    pub description: String,
    pub listing_url: String,
    pub vendor_id: u64,
    /// (average, count) when the row carried a rating.
    pub rating: Option<(f64, u64)>,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A similarity-search hit. `is_competitor` and `busy` are session-local UI
/// state, recreated fresh on every search response.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: u64,
    pub title: String,
    pub price: u64,
    pub photo: String,
    pub listing_url: String,
    pub vendor_id: u64,
    pub is_competitor: bool,
    pub busy: bool,
}

/// A tracked competitor with display data resolved from the detail endpoint.
#[derive(Debug, Clone)]
pub struct Competitor {
    pub id: u64,
    pub title: String,
    pub price: u64,
    pub photo: String,
    pub vendor_id: u64,
    pub listing_url: String,
}

/// What the link-list endpoint returns per tracked competitor; display data
/// requires a separate detail lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetitorLink {
    pub op_product: u64,
    pub op_vendor: u64,
}

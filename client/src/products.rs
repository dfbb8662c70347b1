use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::http::read_json;
use crate::mapping::{candidate_from_row, product_from_row};
use crate::model::{Candidate, Product};

fn rows(body: &Value) -> &[Value] {
    body.get("products")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// The seller's own listings. One authenticated GET, rows mapped
/// defensively; a malformed row becomes a defaulted product, never an error.
pub async fn fetch_my_products(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
) -> Result<Vec<Product>, ApiError> {
    let url = format!("{}/my-products", cfg.api_base_url.trim_end_matches('/'));
    let resp = client.get(&url).bearer_auth(token).send().await?;
    let body = read_json(resp).await?;
    let products: Vec<Product> = rows(&body)
        .iter()
        .map(|row| product_from_row(row, &cfg.listing_base_url))
        .collect();
    debug!(target: "products", "fetched {} own products", products.len());
    Ok(products)
}

/// Similarity search scoped to one of the seller's products. Hits come back
/// with cleared UI flags; they are session-local and rebuilt per response.
pub async fn search_similar(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
    title: &str,
    product_id: u64,
    page: u32,
) -> Result<Vec<Candidate>, ApiError> {
    let mut url = Url::parse(&format!(
        "{}/similar-products",
        cfg.search_base_url.trim_end_matches('/')
    ))
    .map_err(|e| ApiError::Decode(format!("bad search url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("title", title)
        .append_pair("product_id", &product_id.to_string())
        .append_pair("page", &page.to_string());

    let resp = client.get(url).bearer_auth(token).send().await?;
    let body = read_json(resp).await?;
    let candidates: Vec<Candidate> = rows(&body)
        .iter()
        .map(|row| candidate_from_row(row, &cfg.listing_base_url))
        .collect();
    debug!(
        target: "products",
        "similarity search for product {} page {} returned {} hits",
        product_id, page, candidates.len()
    );
    Ok(candidates)
}

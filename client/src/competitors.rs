//! Tracked-competitor reads and writes.
//!
//! The link-list endpoint only returns `{op_product, op_vendor}` pairs;
//! display data needs a per-item detail lookup. Details are memoized in a
//! session cache keyed by product id and treated as immutable for the
//! session, so a cached id is never refetched.

use std::collections::HashMap;

use futures::{stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::http::read_json;
use crate::mapping::competitor_from_detail;
use crate::model::{Competitor, CompetitorLink};

/// Cap on simultaneous detail lookups.
const DETAIL_CONCURRENCY: usize = 3;

pub async fn fetch_competitor_links(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
    product_id: u64,
) -> Result<Vec<CompetitorLink>, ApiError> {
    let mut url = Url::parse(&format!(
        "{}/competitors",
        cfg.api_base_url.trim_end_matches('/')
    ))
    .map_err(|e| ApiError::Decode(format!("bad competitors url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("product_id", &product_id.to_string());

    let resp = client.get(url).bearer_auth(token).send().await?;
    let body = read_json(resp).await?;
    let links = body
        .get("competitors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|row| {
            let op_product = row.get("op_product").and_then(Value::as_u64)?;
            let op_vendor = row.get("op_vendor").and_then(Value::as_u64).unwrap_or(0);
            Some(CompetitorLink {
                op_product,
                op_vendor,
            })
        })
        .collect();
    Ok(links)
}

async fn fetch_detail(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
    link: CompetitorLink,
) -> Result<Competitor, ApiError> {
    let mut url = Url::parse(&format!(
        "{}/product-detail",
        cfg.api_base_url.trim_end_matches('/')
    ))
    .map_err(|e| ApiError::Decode(format!("bad detail url: {e}")))?;
    url.query_pairs_mut()
        .append_pair("id", &link.op_product.to_string());

    let resp = client.get(url).bearer_auth(token).send().await?;
    let body = read_json(resp).await?;
    Ok(competitor_from_detail(
        &body,
        link.op_vendor,
        &cfg.listing_base_url,
    ))
}

/// Resolve links into display-ready competitors, at most
/// [`DETAIL_CONCURRENCY`] lookups in flight. Already-cached ids are served
/// from `cache`; freshly resolved ones are appended to it. A failed
/// individual lookup is logged and skipped. Output keeps link order.
pub async fn resolve_competitors(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
    links: &[CompetitorLink],
    cache: &mut HashMap<u64, Competitor>,
) -> Vec<Competitor> {
    let missing: Vec<CompetitorLink> = links
        .iter()
        .filter(|l| !cache.contains_key(&l.op_product))
        .copied()
        .collect();

    let resolved: Vec<(u64, Result<Competitor, ApiError>)> = stream::iter(missing)
        .map(|link| async move {
            (link.op_product, fetch_detail(client, cfg, token, link).await)
        })
        .buffer_unordered(DETAIL_CONCURRENCY)
        .collect()
        .await;

    for (id, result) in resolved {
        match result {
            Ok(competitor) => {
                cache.insert(id, competitor);
            }
            Err(err) => warn!(target: "competitors", "detail lookup for {} failed: {}", id, err),
        }
    }

    let out: Vec<Competitor> = links
        .iter()
        .filter_map(|l| cache.get(&l.op_product).cloned())
        .collect();
    debug!(
        target: "competitors",
        "resolved {}/{} competitor details", out.len(), links.len()
    );
    out
}

/// Register a candidate as a tracked competitor. All three ids are required;
/// the operation refuses to proceed with a zero id rather than sending a
/// half-formed link.
pub async fn add_competitor(
    client: &Client,
    cfg: &ClientConfig,
    token: &str,
    self_product: u64,
    op_product: u64,
    op_vendor: u64,
) -> Result<(), ApiError> {
    if self_product == 0 {
        return Err(ApiError::MissingField("self_product"));
    }
    if op_product == 0 {
        return Err(ApiError::MissingField("op_product"));
    }
    if op_vendor == 0 {
        return Err(ApiError::MissingField("op_vendor"));
    }

    let url = format!("{}/competitors", cfg.api_base_url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .bearer_auth(token)
        .json(&json!({
            "self_product": self_product,
            "op_product": op_product,
            "op_vendor": op_vendor,
        }))
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ApiError::HttpStatus { status, text });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_ids_resolve_without_a_detail_lookup() {
        let client = Client::new();
        let cfg = ClientConfig::default();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");

        let links = vec![
            CompetitorLink {
                op_product: 2,
                op_vendor: 20,
            },
            CompetitorLink {
                op_product: 1,
                op_vendor: 10,
            },
        ];
        let mut cache: HashMap<u64, Competitor> = HashMap::new();
        for link in &links {
            cache.insert(
                link.op_product,
                Competitor {
                    id: link.op_product,
                    title: format!("cached {}", link.op_product),
                    price: link.op_product * 1_000,
                    photo: String::new(),
                    vendor_id: link.op_vendor,
                    listing_url: String::new(),
                },
            );
        }

        // every id is already cached, so nothing is missing and no request
        // is issued; this resolves entirely offline
        let out = rt.block_on(resolve_competitors(&client, &cfg, "t", &links, &mut cache));
        assert_eq!(out.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(out[0].title, "cached 2");
        assert_eq!(out[1].price, 1_000);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn add_competitor_refuses_missing_ids() {
        let client = Client::new();
        let cfg = ClientConfig::default();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        // id validation happens before any request is issued, so these
        // resolve immediately without network access
        let err = rt
            .block_on(add_competitor(&client, &cfg, "t", 0, 2, 3))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingField("self_product")));
        let err = rt
            .block_on(add_competitor(&client, &cfg, "t", 1, 0, 3))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingField("op_product")));
        let err = rt
            .block_on(add_competitor(&client, &cfg, "t", 1, 2, 0))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingField("op_vendor")));
    }
}

//! Background fetch tasks. Each task issues one request (no retries), maps
//! the outcome into a [`Msg`] tagged with the generation it was spawned
//! under, and sends it back to the reducer. Stale generations are dropped
//! on the receiving side.

use std::collections::HashMap;
use std::time::Duration;

use basalam_client::{auth, competitors, products, ApiError, ClientConfig, Competitor, Store};
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::app::{FetchErr, Msg};

/// Delay before re-reading the confirmed list after a successful add, so the
/// write can propagate upstream.
pub const CONFIRMED_REFRESH_DELAY: Duration = Duration::from_millis(1500);

impl From<ApiError> for FetchErr {
    fn from(err: ApiError) -> Self {
        FetchErr {
            auth: err.is_auth(),
            message: err.to_string(),
        }
    }
}

pub fn spawn_login(
    tx: UnboundedSender<Msg>,
    client: Client,
    cfg: ClientConfig,
    username: String,
    password: String,
) {
    tokio::spawn(async move {
        let result = auth::login(&client, &cfg, &username, &password)
            .await
            .map_err(FetchErr::from);
        let _ = tx.send(Msg::LoginDone { result });
    });
}

pub fn spawn_products(
    tx: UnboundedSender<Msg>,
    client: Client,
    cfg: ClientConfig,
    token: String,
    gen: u64,
) {
    tokio::spawn(async move {
        let result = products::fetch_my_products(&client, &cfg, &token)
            .await
            .map_err(FetchErr::from);
        let _ = tx.send(Msg::ProductsLoaded { gen, result });
    });
}

pub fn spawn_similars(
    tx: UnboundedSender<Msg>,
    client: Client,
    cfg: ClientConfig,
    token: String,
    gen: u64,
    product_id: u64,
    title: String,
) {
    tokio::spawn(async move {
        let result = products::search_similar(&client, &cfg, &token, &title, product_id, 1)
            .await
            .map_err(FetchErr::from);
        let _ = tx.send(Msg::SimilarsLoaded {
            gen,
            product_id,
            result,
        });
    });
}

/// Link-list read plus the bounded-concurrency detail resolution. The task
/// works on a snapshot of the session cache and ships the grown cache back
/// with the result; the reducer merges it (append-only).
pub fn spawn_confirmed(
    tx: UnboundedSender<Msg>,
    client: Client,
    cfg: ClientConfig,
    token: String,
    gen: u64,
    product_id: u64,
    mut cache: HashMap<u64, Competitor>,
) {
    tokio::spawn(async move {
        match competitors::fetch_competitor_links(&client, &cfg, &token, product_id).await {
            Ok(links) => {
                let resolved =
                    competitors::resolve_competitors(&client, &cfg, &token, &links, &mut cache)
                        .await;
                let _ = tx.send(Msg::ConfirmedLoaded {
                    gen,
                    product_id,
                    competitors: resolved,
                    cache,
                });
            }
            Err(err) => {
                let _ = tx.send(Msg::ConfirmedFailed {
                    gen,
                    error: err.into(),
                });
            }
        }
    });
}

pub fn spawn_add_competitor(
    tx: UnboundedSender<Msg>,
    client: Client,
    cfg: ClientConfig,
    token: String,
    gen: u64,
    self_product: u64,
    op_product: u64,
    op_vendor: u64,
) {
    tokio::spawn(async move {
        let result =
            competitors::add_competitor(&client, &cfg, &token, self_product, op_product, op_vendor)
                .await
                .map_err(FetchErr::from);
        let ok = result.is_ok();
        let _ = tx.send(Msg::AddCompetitorDone {
            gen,
            candidate_id: op_product,
            result,
        });
        if ok {
            tokio::time::sleep(CONFIRMED_REFRESH_DELAY).await;
            let _ = tx.send(Msg::RefreshConfirmed {
                gen,
                product_id: self_product,
            });
        }
    });
}

pub fn spawn_load_hidden(tx: UnboundedSender<Msg>, store: Store, gen: u64, product_id: u64) {
    tokio::spawn(async move {
        match store.load_hidden_ids(product_id).await {
            Ok(ids) => {
                let _ = tx.send(Msg::HiddenLoaded {
                    gen,
                    product_id,
                    ids,
                });
            }
            Err(err) => warn!(target: "store", "load hidden ids for {}: {}", product_id, err),
        }
    });
}

pub fn spawn_save_hidden(store: Store, product_id: u64, ids: std::collections::HashSet<u64>) {
    tokio::spawn(async move {
        if let Err(err) = store.save_hidden_ids(product_id, &ids).await {
            warn!(target: "store", "persist hidden ids for {}: {}", product_id, err);
        }
    });
}

pub fn spawn_save_session(store: Store, token: String) {
    tokio::spawn(async move {
        if let Err(err) = store.save_session(&token).await {
            warn!(target: "store", "persist session: {}", err);
        }
    });
}

pub fn spawn_clear_session(store: Store) {
    tokio::spawn(async move {
        if let Err(err) = store.clear_session().await {
            warn!(target: "store", "clear session: {}", err);
        }
    });
}

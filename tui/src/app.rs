//! Application state and reducer.
//!
//! All mutation goes through [`AppState::update`] with an explicit [`Msg`],
//! so every transition is enumerable and testable without rendering. Network
//! completions carry the generation they were spawned under; a completion
//! whose generation no longer matches is dropped instead of applied.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use basalam_client::{
    compare, http, Candidate, ClientConfig, Competitor, HiddenFilter, PendingSet, PriceFilter,
    Product, Store,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::worker;

const TOAST_TTL: Duration = Duration::from_secs(2);
const PAGE_STEP: usize = 6;
const SIMILARS_STEP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
    Products,
    ProductDetail,
    NotBestPrice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
    pub busy: bool,
    pub error: Option<String>,
}

impl LoginForm {
    fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            field: LoginField::Username,
            busy: false,
            error: None,
        }
    }
}

/// Display-ready fetch failure; `auth` forces a return to the login screen.
#[derive(Debug, Clone)]
pub struct FetchErr {
    pub message: String,
    pub auth: bool,
}

/// Per-product detail-screen state, rebuilt on every product selection.
#[derive(Debug)]
pub struct DetailState {
    pub product: Product,
    pub candidates: Vec<Candidate>,
    pub confirmed: Vec<Competitor>,
    pub show_similars: bool,
    pub price_filter: PriceFilter,
    pub hidden_apply: bool,
    pub hidden_ids: HashSet<u64>,
    pub sel: usize,
    pub visible: usize,
    pub loading_similars: bool,
    pub loading_confirmed: bool,
    pub error: Option<String>,
}

impl DetailState {
    fn new(product: Product) -> Self {
        Self {
            product,
            candidates: Vec::new(),
            confirmed: Vec::new(),
            show_similars: true,
            price_filter: PriceFilter::default(),
            hidden_apply: true,
            hidden_ids: HashSet::new(),
            sel: 0,
            visible: SIMILARS_STEP,
            loading_similars: false,
            loading_confirmed: false,
            error: None,
        }
    }
}

pub enum Msg {
    Key(KeyEvent),
    Tick,
    LoginDone {
        result: Result<String, FetchErr>,
    },
    ProductsLoaded {
        gen: u64,
        result: Result<Vec<Product>, FetchErr>,
    },
    SimilarsLoaded {
        gen: u64,
        product_id: u64,
        result: Result<Vec<Candidate>, FetchErr>,
    },
    HiddenLoaded {
        gen: u64,
        product_id: u64,
        ids: HashSet<u64>,
    },
    ConfirmedLoaded {
        gen: u64,
        product_id: u64,
        competitors: Vec<Competitor>,
        cache: HashMap<u64, Competitor>,
    },
    ConfirmedFailed {
        gen: u64,
        error: FetchErr,
    },
    AddCompetitorDone {
        gen: u64,
        candidate_id: u64,
        result: Result<(), FetchErr>,
    },
    RefreshConfirmed {
        gen: u64,
        product_id: u64,
    },
}

pub struct AppState {
    pub cfg: ClientConfig,
    pub store: Store,
    pub client: Client,
    tx: UnboundedSender<Msg>,

    pub token: Option<String>,
    pub screen: Screen,
    /// Liveness counter: bumped whenever in-flight results would no longer
    /// apply (product change, leaving detail, logout).
    generation: u64,

    pub products: Vec<Product>,
    products_fetched: bool,
    pub loading_products: bool,
    pub products_error: Option<String>,
    pub search_term: String,
    pub search_editing: bool,
    pub sort: SortOrder,
    pub products_sel: usize,
    pub products_visible: usize,

    pub detail: Option<DetailState>,
    detail_cache: HashMap<u64, Competitor>,
    pending_adds: PendingSet<u64>,

    pub dashboard_sel: usize,
    pub login: LoginForm,
    pub toast: Option<(String, Instant)>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(
        cfg: ClientConfig,
        store: Store,
        token: Option<String>,
        tx: UnboundedSender<Msg>,
    ) -> anyhow::Result<Self> {
        let client = http::build_client(&cfg)?;
        let screen = if token.is_some() {
            Screen::Dashboard
        } else {
            Screen::Login
        };
        Ok(Self {
            cfg,
            store,
            client,
            tx,
            token,
            screen,
            generation: 0,
            products: Vec::new(),
            products_fetched: false,
            loading_products: false,
            products_error: None,
            search_term: String::new(),
            search_editing: false,
            sort: SortOrder::Newest,
            products_sel: 0,
            products_visible: PAGE_STEP,
            detail: None,
            detail_cache: HashMap::new(),
            pending_adds: PendingSet::new(),
            dashboard_sel: 0,
            login: LoginForm::new(),
            toast: None,
            should_quit: false,
        })
    }

    /// Navigate with the session invariants enforced: no token always lands
    /// on the login screen, a live session never shows it.
    fn goto(&mut self, screen: Screen) {
        let target = match (&self.token, screen) {
            (None, _) => Screen::Login,
            (Some(_), Screen::Login) => Screen::Dashboard,
            (Some(_), other) => other,
        };
        if self.screen == Screen::ProductDetail && target != Screen::ProductDetail {
            // in-flight detail fetches must not apply after leaving
            self.generation += 1;
            self.detail = None;
        }
        self.screen = target;
        if target == Screen::Products && !self.products_fetched {
            self.products_fetched = true;
            self.loading_products = true;
            self.spawn_products();
        }
    }

    fn toast(&mut self, message: impl Into<String>) {
        self.toast = Some((message.into(), Instant::now()));
    }

    /// The candidate list exactly as the detail screen renders it.
    pub fn filtered_candidates(&self) -> Vec<Candidate> {
        let Some(detail) = &self.detail else {
            return Vec::new();
        };
        compare::filter_candidates(
            &detail.candidates,
            detail.product.price,
            detail.price_filter,
            HiddenFilter {
                apply: detail.hidden_apply,
                ids: &detail.hidden_ids,
            },
        )
    }

    /// Title-filtered, date-sorted product list for the products screen.
    pub fn visible_products(&self) -> Vec<&Product> {
        let needle = self.search_term.to_lowercase();
        let mut out: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| needle.is_empty() || p.title.to_lowercase().contains(&needle))
            .collect();
        out.sort_by(|a, b| match self.sort {
            SortOrder::Newest => b.created_at.cmp(&a.created_at),
            SortOrder::Oldest => a.created_at.cmp(&b.created_at),
        });
        out
    }

    pub fn update(&mut self, msg: Msg) {
        match msg {
            Msg::Key(key) => self.on_key(key),
            Msg::Tick => {
                if let Some((_, at)) = &self.toast {
                    if at.elapsed() >= TOAST_TTL {
                        self.toast = None;
                    }
                }
            }
            Msg::LoginDone { result } => self.on_login_done(result),
            Msg::ProductsLoaded { gen, result } => {
                if gen != self.generation {
                    return;
                }
                self.loading_products = false;
                match result {
                    Ok(products) => {
                        self.products = products;
                        self.products_error = None;
                        self.products_sel = 0;
                    }
                    Err(err) => self.on_fetch_error(err, |app, msg| {
                        app.products_error = Some(msg);
                    }),
                }
            }
            Msg::SimilarsLoaded {
                gen,
                product_id,
                result,
            } => {
                if gen != self.generation {
                    return;
                }
                let Some(detail) = &mut self.detail else {
                    return;
                };
                if detail.product.id != product_id {
                    return;
                }
                detail.loading_similars = false;
                match result {
                    Ok(candidates) => {
                        detail.candidates = candidates;
                        detail.error = None;
                        detail.sel = 0;
                    }
                    Err(err) => self.on_fetch_error(err, |app, msg| {
                        if let Some(d) = &mut app.detail {
                            d.error = Some(msg);
                        }
                    }),
                }
            }
            Msg::HiddenLoaded {
                gen,
                product_id,
                ids,
            } => {
                if gen != self.generation {
                    return;
                }
                if let Some(detail) = &mut self.detail {
                    if detail.product.id == product_id {
                        detail.hidden_ids = ids;
                    }
                }
            }
            Msg::ConfirmedLoaded {
                gen,
                product_id,
                competitors,
                cache,
            } => {
                // the detail cache is append-only for the session, so merge
                // even when the view has moved on
                self.detail_cache.extend(cache);
                if gen != self.generation {
                    return;
                }
                if let Some(detail) = &mut self.detail {
                    if detail.product.id == product_id {
                        detail.loading_confirmed = false;
                        detail.confirmed = competitors;
                    }
                }
            }
            Msg::ConfirmedFailed { gen, error } => {
                if gen != self.generation {
                    return;
                }
                if let Some(detail) = &mut self.detail {
                    detail.loading_confirmed = false;
                }
                self.on_fetch_error(error, |app, msg| {
                    if let Some(d) = &mut app.detail {
                        d.error = Some(msg);
                    }
                });
            }
            Msg::AddCompetitorDone {
                gen,
                candidate_id,
                result,
            } => {
                self.pending_adds.finish(&candidate_id);
                if gen != self.generation {
                    return;
                }
                let Some(detail) = &mut self.detail else {
                    return;
                };
                let Some(candidate) = detail
                    .candidates
                    .iter_mut()
                    .find(|c| c.id == candidate_id)
                else {
                    return;
                };
                candidate.busy = false;
                match result {
                    Ok(()) => {
                        candidate.is_competitor = true;
                        let title = candidate.title.clone();
                        self.toast(format!("\"{title}\" added as competitor"));
                    }
                    Err(err) => {
                        let msg = err.message.clone();
                        self.on_fetch_error(err, |app, _| {
                            app.toast(format!("add failed: {msg}"));
                        });
                    }
                }
            }
            Msg::RefreshConfirmed { gen, product_id } => {
                if gen != self.generation {
                    return;
                }
                let matches = self
                    .detail
                    .as_ref()
                    .map(|d| d.product.id == product_id)
                    .unwrap_or(false);
                if matches {
                    self.spawn_confirmed(product_id);
                }
            }
        }
    }

    fn on_login_done(&mut self, result: Result<String, FetchErr>) {
        self.login.busy = false;
        match result {
            Ok(token) => {
                info!(target: "app", "session established");
                self.token = Some(token.clone());
                self.login = LoginForm::new();
                worker::spawn_save_session(self.store.clone(), token);
                self.goto(Screen::Dashboard);
            }
            Err(err) => {
                self.login.error = Some(err.message);
                self.login.password.clear();
            }
        }
    }

    /// Shared read-failure handling: an auth failure tears the session down
    /// and forces login; anything else is surfaced where the caller says,
    /// leaving previously loaded data untouched.
    fn on_fetch_error(&mut self, err: FetchErr, surface: impl FnOnce(&mut Self, String)) {
        if err.auth {
            self.force_logout(Some(err.message));
        } else {
            surface(self, err.message);
        }
    }

    fn force_logout(&mut self, reason: Option<String>) {
        info!(target: "app", "session invalidated");
        self.token = None;
        self.generation += 1;
        self.detail = None;
        self.products.clear();
        self.products_fetched = false;
        self.login = LoginForm::new();
        self.login.error = reason;
        worker::spawn_clear_session(self.store.clone());
        self.screen = Screen::Login;
    }

    // -- key handling ----------------------------------------------------

    fn on_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        match self.screen {
            Screen::Login => self.on_key_login(key),
            Screen::Dashboard => self.on_key_dashboard(key),
            Screen::Products => self.on_key_products(key),
            Screen::ProductDetail => self.on_key_detail(key),
            Screen::NotBestPrice => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.goto(Screen::Dashboard),
                _ => {}
            },
        }
    }

    fn on_key_login(&mut self, key: KeyEvent) {
        if self.login.busy {
            return;
        }
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
                self.login.field = match self.login.field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            KeyCode::Enter => {
                if self.login.username.is_empty() || self.login.password.is_empty() {
                    self.login.error = Some("enter username and password".to_string());
                    return;
                }
                self.login.busy = true;
                self.login.error = None;
                worker::spawn_login(
                    self.tx.clone(),
                    self.client.clone(),
                    self.cfg.clone(),
                    self.login.username.clone(),
                    self.login.password.clone(),
                );
            }
            KeyCode::Backspace => {
                match self.login.field {
                    LoginField::Username => self.login.username.pop(),
                    LoginField::Password => self.login.password.pop(),
                };
            }
            KeyCode::Char(ch) => match self.login.field {
                LoginField::Username => self.login.username.push(ch),
                LoginField::Password => self.login.password.push(ch),
            },
            _ => {}
        }
    }

    fn on_key_dashboard(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Down => self.dashboard_sel = 1 - self.dashboard_sel,
            KeyCode::Enter => {
                if self.dashboard_sel == 0 {
                    self.goto(Screen::Products);
                } else {
                    self.goto(Screen::NotBestPrice);
                }
            }
            KeyCode::Char('l') => self.force_logout(None),
            _ => {}
        }
    }

    fn on_key_products(&mut self, key: KeyEvent) {
        if self.search_editing {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.search_editing = false,
                KeyCode::Backspace => {
                    self.search_term.pop();
                    self.products_sel = 0;
                }
                KeyCode::Char(ch) => {
                    self.search_term.push(ch);
                    self.products_sel = 0;
                }
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.goto(Screen::Dashboard),
            KeyCode::Char('/') => self.search_editing = true,
            KeyCode::Char('o') => {
                self.sort = match self.sort {
                    SortOrder::Newest => SortOrder::Oldest,
                    SortOrder::Oldest => SortOrder::Newest,
                };
                self.products_sel = 0;
            }
            KeyCode::Up => self.products_sel = self.products_sel.saturating_sub(1),
            KeyCode::Down => {
                let total = self.visible_products().len();
                if total == 0 {
                    return;
                }
                self.products_sel = (self.products_sel + 1).min(total - 1);
                // reveal the next page once the cursor reaches the edge
                if self.products_sel + 1 >= self.products_visible {
                    self.products_visible = (self.products_visible + PAGE_STEP).min(total);
                }
            }
            KeyCode::Enter => {
                let selected = self
                    .visible_products()
                    .get(self.products_sel)
                    .map(|p| (*p).clone());
                if let Some(product) = selected {
                    self.select_product(product);
                }
            }
            _ => {}
        }
    }

    fn on_key_detail(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.goto(Screen::Products),
            KeyCode::Char('s') => {
                if let Some(d) = &mut self.detail {
                    d.show_similars = !d.show_similars;
                }
            }
            KeyCode::Char('v') => {
                if let Some(d) = &mut self.detail {
                    d.hidden_apply = !d.hidden_apply;
                    d.sel = 0;
                }
            }
            KeyCode::Char('f') => {
                if let Some(d) = &mut self.detail {
                    d.price_filter.enabled = !d.price_filter.enabled;
                    d.sel = 0;
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if let Some(d) = &mut self.detail {
                    let next = (d.price_filter.max_over_percent + 5).min(50);
                    // a changed ceiling reshapes the list; re-anchor the
                    // highlight so it cannot land on an unintended item
                    if d.price_filter.enabled && next != d.price_filter.max_over_percent {
                        d.sel = 0;
                    }
                    d.price_filter.max_over_percent = next;
                }
            }
            KeyCode::Char('-') => {
                if let Some(d) = &mut self.detail {
                    let next = d.price_filter.max_over_percent.saturating_sub(5);
                    if d.price_filter.enabled && next != d.price_filter.max_over_percent {
                        d.sel = 0;
                    }
                    d.price_filter.max_over_percent = next;
                }
            }
            KeyCode::Up => {
                if let Some(d) = &mut self.detail {
                    d.sel = d.sel.saturating_sub(1);
                }
            }
            KeyCode::Down => {
                let total = self.filtered_candidates().len();
                if let Some(d) = &mut self.detail {
                    if total == 0 {
                        return;
                    }
                    d.sel = (d.sel + 1).min(total - 1);
                    if d.sel + 1 >= d.visible {
                        d.visible = (d.visible + SIMILARS_STEP).min(total);
                    }
                }
            }
            KeyCode::Char('a') => self.add_selected_competitor(),
            KeyCode::Char('h') => self.hide_selected(),
            KeyCode::Char('H') => self.hide_visible(),
            KeyCode::Char('r') => self.reset_hidden(),
            _ => {}
        }
    }

    // -- operations ------------------------------------------------------

    fn select_product(&mut self, product: Product) {
        self.generation += 1;
        let gen = self.generation;
        let product_id = product.id;
        let title = product.title.clone();

        let mut detail = DetailState::new(product);
        detail.loading_similars = true;
        detail.loading_confirmed = true;
        self.detail = Some(detail);
        self.screen = Screen::ProductDetail;

        let Some(token) = self.token.clone() else {
            self.goto(Screen::Login);
            return;
        };
        worker::spawn_load_hidden(self.tx.clone(), self.store.clone(), gen, product_id);
        worker::spawn_similars(
            self.tx.clone(),
            self.client.clone(),
            self.cfg.clone(),
            token,
            gen,
            product_id,
            title,
        );
        self.spawn_confirmed(product_id);
    }

    fn spawn_confirmed(&mut self, product_id: u64) {
        let Some(token) = self.token.clone() else {
            return;
        };
        if let Some(d) = &mut self.detail {
            d.loading_confirmed = true;
        }
        worker::spawn_confirmed(
            self.tx.clone(),
            self.client.clone(),
            self.cfg.clone(),
            token,
            self.generation,
            product_id,
            self.detail_cache.clone(),
        );
    }

    fn spawn_products(&mut self) {
        let Some(token) = self.token.clone() else {
            return;
        };
        worker::spawn_products(
            self.tx.clone(),
            self.client.clone(),
            self.cfg.clone(),
            token,
            self.generation,
        );
    }

    fn add_selected_competitor(&mut self) {
        let Some(selected) = self.filtered_candidates().get(self.detail_sel()).cloned() else {
            return;
        };
        let Some(product_id) = self.detail.as_ref().map(|d| d.product.id) else {
            return;
        };
        if selected.is_competitor {
            self.toast("already a competitor");
            return;
        }
        if selected.vendor_id == 0 || selected.id == 0 || product_id == 0 {
            self.toast("candidate is missing ids, cannot add");
            return;
        }
        // duplicate submission while in flight is a no-op
        if !self.pending_adds.begin(selected.id) {
            return;
        }
        if let Some(d) = &mut self.detail {
            if let Some(c) = d.candidates.iter_mut().find(|c| c.id == selected.id) {
                c.busy = true;
            }
        }
        let Some(token) = self.token.clone() else {
            return;
        };
        worker::spawn_add_competitor(
            self.tx.clone(),
            self.client.clone(),
            self.cfg.clone(),
            token,
            self.generation,
            product_id,
            selected.id,
            selected.vendor_id,
        );
    }

    fn detail_sel(&self) -> usize {
        self.detail.as_ref().map(|d| d.sel).unwrap_or(0)
    }

    fn hide_selected(&mut self) {
        let Some(selected_id) = self.filtered_candidates().get(self.detail_sel()).map(|c| c.id)
        else {
            return;
        };
        if let Some(d) = &mut self.detail {
            d.hidden_ids.insert(selected_id);
        }
        let remaining = self.filtered_candidates().len();
        if let Some(d) = &mut self.detail {
            d.sel = d.sel.min(remaining.saturating_sub(1));
        }
        self.persist_hidden();
        self.toast("candidate hidden");
    }

    fn hide_visible(&mut self) {
        let visible: Vec<u64> = {
            let Some(d) = &self.detail else { return };
            self.filtered_candidates()
                .iter()
                .take(d.visible)
                .map(|c| c.id)
                .collect()
        };
        if visible.is_empty() {
            return;
        }
        let count = visible.len();
        if let Some(d) = &mut self.detail {
            d.hidden_ids.extend(visible);
            d.sel = 0;
        }
        self.persist_hidden();
        self.toast(format!("{count} candidates hidden"));
    }

    fn reset_hidden(&mut self) {
        if let Some(d) = &mut self.detail {
            d.hidden_ids.clear();
            d.sel = 0;
        }
        self.persist_hidden();
        self.toast("hidden list reset");
    }

    fn persist_hidden(&self) {
        if let Some(d) = &self.detail {
            worker::spawn_save_hidden(self.store.clone(), d.product.id, d.hidden_ids.clone());
        }
    }
}

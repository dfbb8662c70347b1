//! Rendering. Pure projection of [`AppState`] onto the frame; no state
//! changes here.

use basalam_client::{compare, Candidate, Competitor, PriceDelta};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{AppState, LoginField, Screen, SortOrder};

pub fn draw(f: &mut Frame, app: &AppState) {
    match app.screen {
        Screen::Login => draw_login(f, app),
        Screen::Dashboard => draw_dashboard(f, app),
        Screen::Products => draw_products(f, app),
        Screen::ProductDetail => draw_detail(f, app),
        Screen::NotBestPrice => draw_not_best_price(f),
    }
    if let Some((message, _)) = &app.toast {
        draw_toast(f, message);
    }
}

fn titled_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ))
}

/// `1234567` -> `1,234,567 toman`.
fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 6);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push_str(" toman");
    out
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_login(f: &mut Frame, app: &AppState) {
    let area = centered(f.size(), 46, 10);
    let block = titled_block("Basalam Seller Panel");
    f.render_widget(block, area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    let focus = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let plain = Style::default().fg(Color::Gray);

    let username_style = if app.login.field == LoginField::Username {
        focus
    } else {
        plain
    };
    let password_style = if app.login.field == LoginField::Password {
        focus
    } else {
        plain
    };
    let masked = "*".repeat(app.login.password.chars().count());

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("username: ", username_style),
            Span::raw(app.login.username.as_str()),
        ])),
        inner[0],
    );
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("password: ", password_style),
            Span::raw(masked),
        ])),
        inner[1],
    );

    let status = if app.login.busy {
        Line::styled("signing in...", Style::default().fg(Color::Cyan))
    } else if let Some(err) = &app.login.error {
        Line::styled(err.as_str(), Style::default().fg(Color::Red))
    } else {
        Line::styled(
            "tab switch field, enter sign in, esc quit",
            Style::default().fg(Color::DarkGray),
        )
    };
    f.render_widget(Paragraph::new(status).wrap(Wrap { trim: true }), inner[3]);
}

fn draw_dashboard(f: &mut Frame, app: &AppState) {
    let area = centered(f.size(), 52, 9);
    let entries = ["Products and competitors", "Not the best price (soon)"];
    let items: Vec<ListItem> = entries
        .iter()
        .map(|e| ListItem::new(Line::from(e.to_string())))
        .collect();
    let mut state = ListState::default();
    state.select(Some(app.dashboard_sel));

    let list = List::new(items)
        .block(titled_block("Dashboard"))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut state);

    let hint = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(2),
        width: area.width,
        height: 1,
    };
    f.render_widget(
        Paragraph::new("enter open, l logout, q quit")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        hint,
    );
}

fn product_row(product: &basalam_client::Product) -> ListItem<'static> {
    let date = product
        .created_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ListItem::new(Line::from(vec![
        Span::styled(
            product.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format_price(product.price), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(date, Style::default().fg(Color::DarkGray)),
    ]))
}

fn draw_products(f: &mut Frame, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.size());

    let sort_label = match app.sort {
        SortOrder::Newest => "newest first",
        SortOrder::Oldest => "oldest first",
    };
    let search_style = if app.search_editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let search = Paragraph::new(Line::from(vec![
        Span::styled("search: ", search_style),
        Span::raw(app.search_term.as_str()),
        Span::styled(
            format!("   [{sort_label}]"),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(titled_block("My products"));
    f.render_widget(search, chunks[0]);

    let visible = app.visible_products();
    let items: Vec<ListItem> = visible
        .iter()
        .take(app.products_visible)
        .map(|p| product_row(p))
        .collect();
    let shown = items.len();
    let mut state = ListState::default();
    if shown > 0 {
        state.select(Some(app.products_sel.min(shown - 1)));
    }
    let title = format!("{shown} of {} shown", visible.len());
    let list = List::new(items)
        .block(titled_block(&title))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], &mut state);

    let footer = if app.loading_products {
        Line::styled("loading products...", Style::default().fg(Color::Cyan))
    } else if let Some(err) = &app.products_error {
        Line::styled(err.as_str(), Style::default().fg(Color::Red))
    } else {
        Line::styled(
            "/ search, o sort order, enter open, esc back",
            Style::default().fg(Color::DarkGray),
        )
    };
    f.render_widget(Paragraph::new(footer), chunks[2]);
}

fn delta_span(delta: Option<PriceDelta>) -> Span<'static> {
    match delta {
        Some(PriceDelta::Cheaper(p)) => Span::styled(
            format!("-{p}% vs lowest"),
            Style::default().fg(Color::Green),
        ),
        Some(PriceDelta::Pricier(p)) => {
            Span::styled(format!("+{p}% vs lowest"), Style::default().fg(Color::Red))
        }
        None => Span::styled("= lowest", Style::default().fg(Color::Blue)),
    }
}

fn candidate_row(candidate: &Candidate) -> ListItem<'static> {
    let mut spans = vec![
        Span::styled(
            format_price(candidate.price),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  "),
        Span::raw(candidate.title.clone()),
    ];
    if candidate.busy {
        spans.push(Span::styled(
            "  [adding...]",
            Style::default().fg(Color::Yellow),
        ));
    } else if candidate.is_competitor {
        spans.push(Span::styled(
            "  [competitor]",
            Style::default().fg(Color::Green),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn competitor_row(competitor: &Competitor) -> ListItem<'static> {
    ListItem::new(Line::from(vec![
        Span::styled(
            format_price(competitor.price),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  "),
        Span::raw(competitor.title.clone()),
    ]))
}

fn draw_detail(f: &mut Frame, app: &AppState) {
    let Some(detail) = &app.detail else {
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(f.size());

    let product = Paragraph::new(vec![
        Line::from(Span::styled(
            detail.product.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(
                format_price(detail.product.price),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("   "),
            Span::styled(
                detail.product.listing_url.clone(),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    ])
    .block(titled_block("Product"));
    f.render_widget(product, rows[0]);

    let stats = compare::competitor_stats(&detail.confirmed, detail.product.price);
    let stats_line = if detail.confirmed.is_empty() {
        Line::styled(
            "no confirmed competitors yet",
            Style::default().fg(Color::DarkGray),
        )
    } else {
        let lowest = stats
            .lowest
            .as_ref()
            .map(|c| format_price(c.price))
            .unwrap_or_else(|| "n/a".to_string());
        Line::from(vec![
            Span::raw(format!(
                "lowest {lowest}   average {}   ",
                format_price(stats.average)
            )),
            delta_span(stats.delta),
        ])
    };
    f.render_widget(
        Paragraph::new(stats_line).block(titled_block("Price comparison")),
        rows[1],
    );

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(rows[2]);

    let candidates = app.filtered_candidates();
    let mut flags = String::new();
    if detail.price_filter.enabled {
        flags.push_str(&format!(" +{}%", detail.price_filter.max_over_percent));
    }
    if detail.hidden_apply && !detail.hidden_ids.is_empty() {
        flags.push_str(&format!(" {} hidden", detail.hidden_ids.len()));
    }
    let candidates_title = if detail.show_similars {
        format!("Similar products ({}){flags}", candidates.len())
    } else {
        "Similar products (hidden)".to_string()
    };
    if detail.show_similars {
        let items: Vec<ListItem> = candidates
            .iter()
            .take(detail.visible)
            .map(candidate_row)
            .collect();
        let shown = items.len();
        let mut state = ListState::default();
        if shown > 0 {
            state.select(Some(detail.sel.min(shown - 1)));
        }
        let list = List::new(items)
            .block(titled_block(&candidates_title))
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, columns[0], &mut state);
    } else {
        f.render_widget(titled_block(&candidates_title), columns[0]);
    }

    let competitors_title = format!("Competitors ({})", detail.confirmed.len());
    let items: Vec<ListItem> = detail.confirmed.iter().map(competitor_row).collect();
    f.render_widget(
        List::new(items).block(titled_block(&competitors_title)),
        columns[1],
    );

    let footer = if detail.loading_similars || detail.loading_confirmed {
        Line::styled("loading...", Style::default().fg(Color::Cyan))
    } else if let Some(err) = &detail.error {
        Line::styled(err.as_str(), Style::default().fg(Color::Red))
    } else {
        Line::styled(
            "a add, h hide, H hide visible, r reset hidden, f price filter, +/- percent, v toggle hidden, s toggle list, esc back",
            Style::default().fg(Color::DarkGray),
        )
    };
    f.render_widget(Paragraph::new(footer), rows[3]);
}

fn draw_not_best_price(f: &mut Frame) {
    let area = centered(f.size(), 50, 5);
    f.render_widget(
        Paragraph::new("This section is still under development.")
            .alignment(Alignment::Center)
            .block(titled_block("Not the best price")),
        area,
    );
}

fn draw_toast(f: &mut Frame, message: &str) {
    let width = (message.chars().count() as u16 + 4).min(f.size().width);
    let area = Rect {
        x: f.size().width.saturating_sub(width + 1),
        y: 1,
        width,
        height: 3,
    };
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            ),
        area,
    );
}

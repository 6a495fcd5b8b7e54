// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Plain-text rendering of one list page.

use serde_json::Value;
use std::fmt::Write as _;
use vitrine_app::input::{InputKind, artwork_input_kind, format_cell};
use vitrine_app::{Artwork, Entity, NoticeLevel, PageItem, TableController};

const COLUMNS: [(&str, &str); 8] = [
    ("id", "ID"),
    ("title", "Title"),
    ("artist", "Artist"),
    ("nationality", "Nat."),
    ("storeType", "Store"),
    ("year", "Year"),
    ("priceCents", "Price"),
    ("location", "Location"),
];

pub fn render_page(controller: &TableController<Artwork>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", render_header(controller));
    out.push_str(&render_rows(controller));
    let _ = writeln!(out, "{}", render_pager(controller));
    out.push_str(&render_filters(controller));
    let location = controller.location();
    let _ = writeln!(
        out,
        "url: ?{}",
        if location.is_empty() { "" } else { &location }
    );
    out
}

fn render_header(controller: &TableController<Artwork>) -> String {
    let mut header = format!(
        "{} · {} total · page {} of {}",
        controller.spec().resource,
        controller.total_count(),
        controller.query().page_index + 1,
        controller.page_count().max(1)
    );
    if let Some(keyword) = &controller.query().keyword {
        let _ = write!(header, " · keyword {keyword:?}");
    }
    if !controller.selection().is_empty() {
        let _ = write!(header, " · {} selected", controller.selection().len());
    }
    if controller.is_loading() {
        header.push_str(if controller.is_stale() {
            " · loading (previous results shown)"
        } else {
            " · loading"
        });
    }
    if controller.is_saving() {
        header.push_str(" · saving");
    }
    if let Some(error) = controller.error() {
        let _ = write!(header, " · error: {error}");
    }
    header
}

fn render_rows(controller: &TableController<Artwork>) -> String {
    let control = controller.selection_control();
    let head_mark = if control.indeterminate {
        "[-]"
    } else if control.checked {
        "[x]"
    } else {
        "[ ]"
    };

    let mut grid: Vec<Vec<String>> = Vec::with_capacity(controller.rows().len() + 1);
    grid.push(
        std::iter::once(head_mark.to_owned())
            .chain(COLUMNS.iter().map(|(_, title)| (*title).to_owned()))
            .collect(),
    );
    for row in controller.rows() {
        let mark = if controller.selection().contains(row.id()) {
            "[x]"
        } else {
            "[ ]"
        };
        let value = serde_json::to_value(row).unwrap_or(Value::Null);
        let cells = COLUMNS.iter().map(|(field, _)| {
            let kind = artwork_input_kind(field).unwrap_or(InputKind::Text);
            format_cell(kind, value.get(*field).unwrap_or(&Value::Null))
        });
        grid.push(std::iter::once(mark.to_owned()).chain(cells).collect());
    }

    let widths: Vec<usize> = (0..=COLUMNS.len())
        .map(|column| {
            grid.iter()
                .map(|line| line[column].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for line in &grid {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    }
    if controller.rows().is_empty() {
        out.push_str("(no rows)\n");
    }
    out
}

pub fn render_pager(controller: &TableController<Artwork>) -> String {
    let current = controller.query().page_index + 1;
    let items: Vec<String> = controller
        .page_range()
        .into_iter()
        .map(|item| match item {
            PageItem::Page(page) if page == current => format!("[{page}]"),
            PageItem::Page(page) => page.to_string(),
            PageItem::Ellipsis => "…".to_owned(),
        })
        .collect();
    if items.is_empty() {
        return "pages: -".to_owned();
    }
    format!("pages: « {} »", items.join(" "))
}

fn render_filters(controller: &TableController<Artwork>) -> String {
    let mut out = String::new();
    let selected = controller.selected_filters();
    if !selected.is_empty() {
        let chips: Vec<String> = selected
            .iter()
            .map(|chip| format!("{}={} ({})", chip.facet_key, chip.value, chip.label))
            .collect();
        let _ = writeln!(out, "filters: {}", chips.join(", "));
    }
    for facet in controller.available_filters() {
        if facet.options.is_empty() {
            continue;
        }
        let options: Vec<String> = facet
            .options
            .iter()
            .map(|option| {
                if option.label == option.value {
                    option.value.clone()
                } else {
                    format!("{} ({})", option.value, option.label)
                }
            })
            .collect();
        let _ = writeln!(out, "{} [{}]: {}", facet.label, facet.key, options.join(", "));
    }
    out
}

pub fn render_notice_prefix(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "note",
        NoticeLevel::Error => "error",
    }
}

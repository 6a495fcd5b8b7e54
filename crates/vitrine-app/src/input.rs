// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Conversion between typed cell text and wire values.

use serde_json::Value;
use time::Date;
use time::macros::format_description;

use crate::model::StoreType;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    RequiredText,
    Money,
    Year,
    Date,
    StoreType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    Required,
    InvalidMoney,
    NegativeMoney,
    InvalidYear,
    InvalidDate,
    UnknownChoice,
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => f.write_str("value is required"),
            Self::InvalidMoney => f.write_str("invalid money value"),
            Self::NegativeMoney => f.write_str("negative money value"),
            Self::InvalidYear => f.write_str("invalid year"),
            Self::InvalidDate => write!(f, "invalid date; expected {DATE_LAYOUT}"),
            Self::UnknownChoice => f.write_str("unknown choice"),
        }
    }
}

impl std::error::Error for InputError {}

pub type InputResult<T> = std::result::Result<T, InputError>;

/// Input kind of an editable artwork column, `None` for read-only ones.
pub fn artwork_input_kind(field_path: &str) -> Option<InputKind> {
    match field_path {
        "title" => Some(InputKind::RequiredText),
        "artist" | "location" | "notes" => Some(InputKind::Text),
        "priceCents" => Some(InputKind::Money),
        "year" => Some(InputKind::Year),
        "acquiredOn" => Some(InputKind::Date),
        "storeType" => Some(InputKind::StoreType),
        _ => None,
    }
}

/// Parses what a user typed into the value sent with a partial update.
/// Blank input clears optional columns.
pub fn parse_cell_input(kind: InputKind, input: &str) -> InputResult<Value> {
    let trimmed = input.trim();
    match kind {
        InputKind::Text => Ok(Value::from(trimmed)),
        InputKind::RequiredText if trimmed.is_empty() => Err(InputError::Required),
        InputKind::RequiredText => Ok(Value::from(trimmed)),
        _ if trimmed.is_empty() => match kind {
            InputKind::StoreType => Err(InputError::Required),
            _ => Ok(Value::Null),
        },
        InputKind::Money => parse_cents(trimmed).map(Value::from),
        InputKind::Year => parse_year(trimmed).map(Value::from),
        InputKind::Date => parse_date(trimmed).map(|date| Value::from(format_date(date))),
        InputKind::StoreType => StoreType::ALL
            .into_iter()
            .find(|store_type| {
                store_type.as_str().eq_ignore_ascii_case(trimmed) || store_type.label() == trimmed
            })
            .map(|store_type| Value::from(store_type.as_str()))
            .ok_or(InputError::UnknownChoice),
    }
}

/// Renders a wire value the way a cell displays it.
pub fn format_cell(kind: InputKind, value: &Value) -> String {
    match (kind, value) {
        (_, Value::Null) => String::new(),
        (InputKind::Money, Value::Number(number)) => {
            number.as_i64().map_or_else(|| number.to_string(), format_cents)
        }
        (InputKind::StoreType, Value::String(raw)) => StoreType::parse(raw)
            .map_or_else(|| raw.clone(), |store_type| store_type.label().to_owned()),
        (_, Value::String(text)) => text.clone(),
        (_, other) => other.to_string(),
    }
}

pub fn format_cents(cents: i64) -> String {
    let (sign, cents) = normalize_sign(cents);
    let dollars = cents / 100;
    let remainder = cents % 100;
    format!("{sign}${}.{:02}", comma_format(dollars), remainder)
}

fn parse_cents(input: &str) -> InputResult<i64> {
    let clean = input.replace(',', "");
    if clean.starts_with('-') {
        return Err(InputError::NegativeMoney);
    }

    let clean = clean.strip_prefix('$').unwrap_or(&clean);
    if clean.is_empty() {
        return Err(InputError::InvalidMoney);
    }

    let (whole, frac) = match clean.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (clean, None),
    };
    let whole = parse_digits(whole, true)?;
    if whole > i64::MAX / 100 {
        return Err(InputError::InvalidMoney);
    }

    let frac = match frac {
        None => 0,
        Some(digits) if digits.len() > 2 => return Err(InputError::InvalidMoney),
        Some(digits) if digits.len() == 1 => parse_digits(digits, false)? * 10,
        Some(digits) => parse_digits(digits, false)?,
    };

    whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac))
        .ok_or(InputError::InvalidMoney)
}

fn parse_digits(input: &str, allow_empty: bool) -> InputResult<i64> {
    if input.is_empty() {
        if allow_empty {
            return Ok(0);
        }
        return Err(InputError::InvalidMoney);
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(InputError::InvalidMoney);
    }
    input.parse::<i64>().map_err(|_| InputError::InvalidMoney)
}

fn parse_year(input: &str) -> InputResult<i32> {
    let value = input.parse::<i32>().map_err(|_| InputError::InvalidYear)?;
    if !(1..=9999).contains(&value) {
        return Err(InputError::InvalidYear);
    }
    Ok(value)
}

fn parse_date(input: &str) -> InputResult<Date> {
    Date::parse(input, &format_description!("[year]-[month]-[day]"))
        .map_err(|_| InputError::InvalidDate)
}

fn format_date(value: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        value.year(),
        u8::from(value.month()),
        value.day()
    )
}

fn comma_format(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    if cents >= 0 {
        return ("", cents);
    }
    if cents == i64::MIN {
        ("-", i64::MAX)
    } else {
        ("-", -cents)
    }
}

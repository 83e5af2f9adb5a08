//! `Link` header parsing and rendering (RFC 8288 subset).
//!
//! Handles several header lines, several comma-separated links per line,
//! quoted and bare parameter values, and space-separated `rel` lists. Each
//! relation of a link yields its own entry.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, LINK};

/// One link target with a single relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValue {
    pub target: String,
    pub relation: Option<String>,
    pub params: BTreeMap<String, String>,
}

/// Parse every `Link` header in `headers`.
pub fn from_headers(headers: &HeaderMap) -> Vec<LinkValue> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse)
        .collect()
}

/// Parse one `Link` header value. Malformed links are skipped.
pub fn parse(header: &str) -> Vec<LinkValue> {
    split_outside(header, ',')
        .into_iter()
        .filter_map(parse_link)
        .flatten()
        .collect()
}

/// Render a single link for use as a header value.
pub fn render(target: &str, relation: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = format!("<{target}>; rel=\"{}\"", escape(relation));
    for (key, value) in params {
        out.push_str(&format!("; {key}=\"{}\"", escape(value)));
    }
    out
}

fn parse_link(raw: &str) -> Option<Vec<LinkValue>> {
    let raw = raw.trim();
    let rest = raw.strip_prefix('<')?;
    let (target, rest) = rest.split_once('>')?;

    let mut relations = Vec::new();
    let mut params = BTreeMap::new();
    for param in split_outside(rest, ';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (key, value) = match param.split_once('=') {
            Some((key, value)) => (key.trim().to_ascii_lowercase(), unquote(value.trim())),
            None => (param.to_ascii_lowercase(), String::new()),
        };
        if key == "rel" && relations.is_empty() {
            relations.extend(value.split_whitespace().map(String::from));
        } else {
            params.insert(key, value);
        }
    }

    Some(explode(target.trim(), relations, params))
}

fn explode(target: &str, relations: Vec<String>, params: BTreeMap<String, String>) -> Vec<LinkValue> {
    if relations.is_empty() {
        return vec![LinkValue {
            target: target.to_string(),
            relation: None,
            params,
        }];
    }

    relations
        .into_iter()
        .map(|relation| LinkValue {
            target: target.to_string(),
            relation: Some(relation),
            params: params.clone(),
        })
        .collect()
}

/// Split on `separator` when it is outside `<...>` and double quotes.
fn split_outside(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_target = false;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' if !in_target => in_quotes = !in_quotes,
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            c if c == separator && !in_target && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Record file format.
//!
//! Most study declarations live in a sectioned `key = value` text format
//! close to classic INI. A parsed file is a __document__: an ordered mapping
//! of section name to an ordered mapping of key to typed scalar.
//!
//! # Scalar Typing
//!
//! Values carry no type annotations on disk, so every value is typed on read
//! by trying, in order:
//!
//! 1. boolean (`true` / `false`, any case),
//! 2. 64-bit signed integer,
//! 3. finite floating-point number,
//! 4. plain string.
//!
//! The first successful parse wins. Callers rely on this order, e.g., `1` is
//! always an integer and never `true`.
//!
//! # Repeated Keys
//!
//! A key that appears more than once in the same section accumulates into an
//! ordered list instead of overwriting the earlier value. Serializing a list
//! emits one line per element, so lists survive a round trip.

use serde_json::{Map, Number, Value};
use std::fmt::Write as _;

/// Parsed record document: section → key → value.
pub type Document = Map<String, Value>;

/// Parse record text into a document.
///
/// Blank lines and lines starting with `;` or `#` are skipped. A section
/// header that appears twice re-opens the earlier section.
///
/// # Errors
///
/// - Return [`IniError::KeyOutsideSection`] if an assignment appears before
///   any section header.
/// - Return [`IniError::Malformed`] if a line is neither a header nor an
///   assignment.
pub fn parse(text: &str) -> Result<Document> {
    let mut document = Document::new();
    let mut current: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim().to_string();
            document
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = Some(name);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(IniError::Malformed {
                line: index + 1,
                content: raw.to_string(),
            });
        };

        let Some(section) = current.as_ref() else {
            return Err(IniError::KeyOutsideSection { line: index + 1 });
        };

        // INVARIANT: Section entry was inserted when its header was read.
        if let Some(Value::Object(body)) = document.get_mut(section) {
            insert_repeated(body, key.trim(), parse_scalar(value.trim()));
        }
    }

    Ok(document)
}

/// Type a raw scalar with the bool → int → float → string order.
pub fn parse_scalar(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }

    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(integer) = raw.parse::<i64>() {
        return Value::Number(integer.into());
    }

    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }

    Value::String(raw.to_string())
}

/// Serialize a document back into record text.
///
/// # Errors
///
/// - Return [`IniError::NotASection`] if a top-level entry is not a mapping.
/// - Return [`IniError::NestedValue`] if a key holds a mapping, or a list
///   holding anything other than scalars.
pub fn to_string(document: &Document) -> Result<String> {
    let mut out = String::new();

    for (position, (section, body)) in document.iter().enumerate() {
        let Value::Object(body) = body else {
            return Err(IniError::NotASection(section.clone()));
        };

        if position > 0 {
            out.push('\n');
        }

        // INVARIANT: Writing into a String cannot fail.
        let _ = writeln!(out, "[{section}]");
        for (key, value) in body {
            match value {
                Value::Array(items) => {
                    for item in items {
                        let _ = writeln!(out, "{key} = {}", format_scalar(section, key, item)?);
                    }
                }
                scalar => {
                    let _ = writeln!(out, "{key} = {}", format_scalar(section, key, scalar)?);
                }
            }
        }
    }

    Ok(out)
}

/// Check whether a value can be stored under a record key.
pub fn is_storable(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_scalar),
        other => is_scalar(other),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn format_scalar(section: &str, key: &str, value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(text.clone()),
        Value::Array(_) | Value::Object(_) => Err(IniError::NestedValue {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn insert_repeated(body: &mut Map<String, Value>, key: &str, value: Value) {
    match body.get_mut(key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            body.insert(key.to_string(), value);
        }
    }
}

/// Record format error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IniError {
    /// Assignment found before any section header.
    #[error("line {line}: key defined outside of any section")]
    KeyOutsideSection { line: usize },

    /// Line is neither a section header nor an assignment.
    #[error("line {line}: cannot parse {content:?}")]
    Malformed { line: usize, content: String },

    /// Top-level document entry is not a section mapping.
    #[error("section {0:?} is not a mapping")]
    NotASection(String),

    /// Key holds a value that has no textual form.
    #[error("key {key:?} of section {section:?} holds a nested value")]
    NestedValue { section: String, key: String },
}

/// Friendly result alias :3
pub type Result<T, E = IniError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use simple_test_case::test_case;

    #[test_case("true", json!(true); "lowercase bool")]
    #[test_case("False", json!(false); "capitalized bool")]
    #[test_case("1", json!(1); "one is an integer")]
    #[test_case("-42", json!(-42); "negative integer")]
    #[test_case("0.5", json!(0.5); "float")]
    #[test_case("1e3", json!(1000.0); "exponent float")]
    #[test_case("nan", json!("nan"); "non finite stays a string")]
    #[test_case("hourly, daily", json!("hourly, daily"); "plain string")]
    #[test_case("", json!(""); "empty string")]
    #[test]
    fn scalar_parse_order(raw: &str, expect: Value) {
        pretty_assertions::assert_eq!(parse_scalar(raw), expect);
    }

    #[test]
    fn parse_document() -> anyhow::Result<()> {
        let result = parse(indoc! {r#"
            ; leading comment
            [general]
            mode = Economy
            nbyears = 2
            year-by-year = false

            [output]
            synthesis = True
            ratio = 0.25
        "#})?;

        let expect = json!({
            "general": { "mode": "Economy", "nbyears": 2, "year-by-year": false },
            "output": { "synthesis": true, "ratio": 0.25 },
        });
        assert_eq!(Value::Object(result), expect);

        Ok(())
    }

    #[test]
    fn repeated_keys_accumulate() -> anyhow::Result<()> {
        let result = parse(indoc! {r#"
            [playlist]
            year = 1
            year = 3
            year = 7
        "#})?;

        assert_eq!(Value::Object(result), json!({ "playlist": { "year": [1, 3, 7] } }));

        Ok(())
    }

    #[test]
    fn reopened_section_merges() -> anyhow::Result<()> {
        let result = parse("[a]\nx = 1\n[b]\ny = 2\n[a]\nz = 3\n")?;
        assert_eq!(
            Value::Object(result),
            json!({ "a": { "x": 1, "z": 3 }, "b": { "y": 2 } })
        );

        Ok(())
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        assert_eq!(
            parse("orphan = 1\n"),
            Err(IniError::KeyOutsideSection { line: 1 })
        );
        assert_eq!(
            parse("[a]\n\nno assignment here\n"),
            Err(IniError::Malformed {
                line: 3,
                content: "no assignment here".into()
            })
        );
    }

    #[test]
    fn serialize_document() -> anyhow::Result<()> {
        let document = json!({
            "nodal optimization": { "non-dispatchable-power": true, "spread-unsupplied-energy-cost": 0.0 },
            "playlist": { "year": [1, 2] },
        });
        let Value::Object(document) = document else { unreachable!() };

        let result = to_string(&document)?;
        let expect = indoc! {r#"
            [nodal optimization]
            non-dispatchable-power = true
            spread-unsupplied-energy-cost = 0.0

            [playlist]
            year = 1
            year = 2
        "#};
        assert_eq!(result, expect);
        assert_eq!(parse(&result)?, document);

        Ok(())
    }

    #[test]
    fn serialize_rejects_nested_values() {
        let Value::Object(document) = json!({ "a": { "b": { "c": 1 } } }) else { unreachable!() };
        assert_eq!(
            to_string(&document),
            Err(IniError::NestedValue {
                section: "a".into(),
                key: "b".into()
            })
        );
    }
}

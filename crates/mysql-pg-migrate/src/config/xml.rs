//! XML configuration parsing.
//!
//! The XML document is walked with quick-xml events into a JSON-like value
//! tree, then deserialized through the same serde structs as the JSON
//! format. Leaf text is coerced to numbers and booleans where it parses as
//! one, so `<port>3306</port>` and `<data_only>true</data_only>` land in
//! typed fields.

use crate::config::Config;
use crate::error::{MigrateError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

/// Parse a `Config` from an XML string.
pub fn from_str(xml: &str) -> Result<Config> {
    let value = parse_document(xml)?;
    serde_json::from_value(value)
        .map_err(|e| MigrateError::Config(format!("failed to parse XML config: {}", e)))
}

fn parse_document(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);

    // Stack of (element name, accumulated children). The sentinel bottom
    // entry collects the root element.
    let mut stack: Vec<(String, Map<String, Value>)> = vec![(String::new(), Map::new())];
    let mut pending_text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                stack.push((name, Map::new()));
                pending_text = None;
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| MigrateError::Config(format!("malformed XML config: {}", e)))?;
                let trimmed = unescaped.trim();
                if !trimmed.is_empty() {
                    pending_text = Some(trimmed.to_string());
                }
            }
            Ok(Event::End(_)) => {
                let (name, children) = stack
                    .pop()
                    .ok_or_else(|| MigrateError::Config("unbalanced XML config".into()))?;
                let text = pending_text.take();
                let value = if children.is_empty() {
                    text.map(scalar).unwrap_or(Value::Null)
                } else {
                    Value::Object(children)
                };
                match stack.last_mut() {
                    Some((_, parent)) => {
                        parent.insert(name, value);
                    }
                    None => return Err(MigrateError::Config("unbalanced XML config".into())),
                }
            }
            Ok(Event::Empty(empty)) => {
                let name = String::from_utf8_lossy(empty.name().as_ref()).to_string();
                if let Some((_, parent)) = stack.last_mut() {
                    parent.insert(name, Value::Null);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(MigrateError::Config(format!("malformed XML config: {}", e)));
            }
        }
    }

    let (_, mut root) = stack.pop().unwrap_or((String::new(), Map::new()));

    // Unwrap the single document element (conventionally <config>).
    if root.len() == 1 {
        if let Some((_, Value::Object(inner))) = root.clone().into_iter().next() {
            return Ok(Value::Object(inner));
        }
    }
    Ok(Value::Object(root))
}

/// Coerce leaf text into the narrowest JSON scalar it parses as.
fn scalar(text: String) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match text.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(scalar("3306".into()), Value::from(3306));
        assert_eq!(scalar("2.5".into()), Value::from(2.5));
        assert_eq!(scalar("true".into()), Value::Bool(true));
        assert_eq!(scalar("hello".into()), Value::String("hello".into()));
    }

    #[test]
    fn test_nested_elements_become_objects() {
        let value = parse_document(
            "<config><source><host>db1</host><port>3306</port></source></config>",
        )
        .unwrap();
        assert_eq!(value["source"]["host"], Value::String("db1".into()));
        assert_eq!(value["source"]["port"], Value::from(3306));
    }

    #[test]
    fn test_mixed_alphanumeric_text_stays_a_string() {
        let value = parse_document("<config><schema>s1</schema></config>").unwrap();
        assert_eq!(value["schema"], Value::String("s1".into()));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse_document("<config><source></config>").is_err());
    }
}

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Serializer, Value};

use crate::errors::Result;
use crate::fs::WriteOptions;

const MAX_INDENT: usize = 10;

/// Called for every key/value pair while serializing, root first with an empty
/// key. Returning `None` drops an object member (array items become `null`).
pub type Replacer = Arc<dyn Fn(&str, Value) -> Option<Value> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indent {
    Spaces(usize),
    Text(String),
}

impl Indent {
    fn as_unit(&self) -> String {
        match self {
            Indent::Spaces(count) => " ".repeat((*count).min(MAX_INDENT)),
            Indent::Text(text) => text.chars().take(MAX_INDENT).collect(),
        }
    }
}

impl From<usize> for Indent {
    fn from(count: usize) -> Self {
        Indent::Spaces(count)
    }
}

impl From<&str> for Indent {
    fn from(text: &str) -> Self {
        Indent::Text(text.to_string())
    }
}

#[derive(Clone, Default)]
pub struct JsonOptions {
    pub spaces: Option<Indent>,
    pub replacer: Option<Replacer>,
    pub write: WriteOptions,
}

impl JsonOptions {
    pub fn with_spaces(mut self, spaces: impl Into<Indent>) -> Self {
        self.spaces = Some(spaces.into());
        self
    }

    pub fn with_replacer<F>(mut self, replacer: F) -> Self
    where
        F: Fn(&str, Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.replacer = Some(Arc::new(replacer));
        self
    }

    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }
}

impl fmt::Debug for JsonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonOptions")
            .field("spaces", &self.spaces)
            .field("replacer", &self.replacer.as_ref().map(|_| "<fn>"))
            .field("write", &self.write)
            .finish()
    }
}

/// Serializes `value` the way the JSON file helpers write it to disk: optional
/// indentation and replacer, followed by a single trailing newline.
pub fn to_json_text<T: Serialize + ?Sized>(value: &T, options: &JsonOptions) -> Result<String> {
    let mut buffer = match &options.replacer {
        Some(replacer) => {
            let raw = serde_json::to_value(value)?;
            let replaced = apply_replacer(replacer.as_ref(), "", raw).unwrap_or(Value::Null);
            write_with_indent(&replaced, options.spaces.as_ref())?
        }
        None => write_with_indent(value, options.spaces.as_ref())?,
    };
    buffer.push(b'\n');
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn write_with_indent<T: Serialize + ?Sized>(value: &T, spaces: Option<&Indent>) -> Result<Vec<u8>> {
    let unit = spaces.map(Indent::as_unit).unwrap_or_default();
    if unit.is_empty() {
        return write_with(value, CompactFormatter);
    }
    write_with(value, PrettyFormatter::with_indent(unit.as_bytes()))
}

fn write_with<T, F>(value: &T, formatter: F) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
    F: Formatter,
{
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

fn apply_replacer(
    replacer: &(dyn Fn(&str, Value) -> Option<Value> + Send + Sync),
    key: &str,
    value: Value,
) -> Option<Value> {
    let value = replacer(key, value)?;
    let value = match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(key, member)| {
                    apply_replacer(replacer, &key, member).map(|member| (key, member))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    apply_replacer(replacer, &index.to_string(), item).unwrap_or(Value::Null)
                })
                .collect(),
        ),
        other => other,
    };
    Some(value)
}

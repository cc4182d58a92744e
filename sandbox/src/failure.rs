use std::fmt;

use serde::Serialize;

/// Which comparison failed. Serialized with the spellings reporters expect.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
pub enum Operator {
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "notExists")]
    NotExists,
    #[serde(rename = "strictEqual")]
    StrictEqual,
    #[serde(rename = "notStrictEqual")]
    NotStrictEqual,
    #[serde(rename = "containsSubset")]
    ContainsSubset,
    #[serde(rename = "deepStrictEqual")]
    DeepStrictEqual,
    #[serde(rename = "deepStrictNotEqual")]
    DeepStrictNotEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exists => "exists",
            Operator::NotExists => "notExists",
            Operator::StrictEqual => "strictEqual",
            Operator::NotStrictEqual => "notStrictEqual",
            Operator::ContainsSubset => "containsSubset",
            Operator::DeepStrictEqual => "deepStrictEqual",
            Operator::DeepStrictNotEqual => "deepStrictNotEqual",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compared value carried by a failure.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AssertionValue {
    Text(String),
    List(Vec<String>),
    /// Source of a regular expression.
    Pattern(String),
}

impl AssertionValue {
    pub fn empty() -> Self {
        AssertionValue::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AssertionValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AssertionValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AssertionValue {
    fn from(text: &str) -> Self {
        AssertionValue::Text(text.to_string())
    }
}

impl From<String> for AssertionValue {
    fn from(text: String) -> Self {
        AssertionValue::Text(text)
    }
}

impl From<Vec<String>> for AssertionValue {
    fn from(items: Vec<String>) -> Self {
        AssertionValue::List(items)
    }
}

/// Renders values the way they appear inside failure messages: quoted
/// strings, bracketed lists, slash-delimited patterns.
impl fmt::Display for AssertionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionValue::Text(text) => write_quoted(f, text),
            AssertionValue::List(items) if items.is_empty() => f.write_str("[]"),
            AssertionValue::List(items) => {
                f.write_str("[ ")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, item)?;
                }
                f.write_str(" ]")
            }
            AssertionValue::Pattern(source) => write!(f, "/{source}/"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in text.chars() {
        match ch {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("'")
}

/// Structured failure handed to reporters.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionFailure {
    pub message: String,
    pub operator: Operator,
    pub expected: AssertionValue,
    pub actual: AssertionValue,
    pub show_diff: bool,
}

impl AssertionFailure {
    /// Failure for a missing or unexpectedly present path: no values, no diff.
    pub fn existence(message: impl Into<String>, operator: Operator) -> Self {
        Self {
            message: message.into(),
            operator,
            expected: AssertionValue::empty(),
            actual: AssertionValue::empty(),
            show_diff: false,
        }
    }

    pub fn comparison(
        message: impl Into<String>,
        operator: Operator,
        expected: impl Into<AssertionValue>,
        actual: impl Into<AssertionValue>,
    ) -> Self {
        Self {
            message: message.into(),
            operator,
            expected: expected.into(),
            actual: actual.into(),
            show_diff: true,
        }
    }

    pub fn without_diff(mut self) -> Self {
        self.show_diff = false;
        self
    }

    pub(crate) fn prefixed(mut self, prefix: Option<&str>) -> Self {
        if let Some(prefix) = prefix {
            self.message = format!("{prefix}: {}", self.message);
        }
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AssertionFailure {}

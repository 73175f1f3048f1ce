//! Built-in refinements
//!
//! Each rule is a check-class refinement installed in both directions, so
//! it runs for `parse` and for parsing with a reversed schema, and is skipped
//! by trusted runs. A rule only inspects values of its own type; anything
//! else passes through to the type check.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use tracing::trace;

use crate::error::Error;
use crate::schema::{Refinement, Schema, Transformer};
use crate::value::Value;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
        .expect("email pattern is valid")
});

static CUID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^c[^\s-]{8,}$").expect("cuid pattern is valid"));

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+[^\s]*$").expect("url pattern is valid")
});

static DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$")
        .expect("datetime pattern is valid")
});

fn message_or(message: Option<&str>, default: impl FnOnce() -> String) -> String {
    message.map_or_else(default, str::to_string)
}

fn is_email(text: &str) -> bool {
    !text.starts_with('.') && !text.contains("..") && EMAIL.is_match(text)
}

fn is_uuid(text: &str) -> bool {
    text.len() == 36 && uuid::Uuid::try_parse(text).is_ok()
}

impl Schema {
    fn rule<F>(&self, rule: &'static str, message: String, accepts: F) -> Schema
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.refine(Refinement::both(move |value, ctx| {
            if accepts(value) {
                Ok(())
            } else {
                trace!(rule, schema = %ctx.schema.name(), "refinement rejected value");
                Err(ctx.fail(message.clone()))
            }
        }))
    }

    fn text_rule<F>(&self, rule: &'static str, message: String, accepts: F) -> Schema
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.rule(rule, message, move |value| value.as_str().is_none_or(&accepts))
    }

    fn number_rule<F>(&self, rule: &'static str, message: String, accepts: F) -> Schema
    where
        F: Fn(f64) -> bool + Send + Sync + 'static,
    {
        self.rule(rule, message, move |value| value.as_f64().is_none_or(&accepts))
    }

    fn items_rule<F>(&self, rule: &'static str, message: String, accepts: F) -> Schema
    where
        F: Fn(usize) -> bool + Send + Sync + 'static,
    {
        self.rule(rule, message, move |value| {
            value.as_array().is_none_or(|items| accepts(items.len()))
        })
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// At least `length` characters.
    pub fn min_length(&self, length: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || {
            format!("String must be {length} or more characters long")
        });
        self.text_rule("min_length", message, move |text| {
            text.chars().count() >= length
        })
    }

    /// At most `length` characters.
    pub fn max_length(&self, length: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || {
            format!("String must be {length} or fewer characters long")
        });
        self.text_rule("max_length", message, move |text| {
            text.chars().count() <= length
        })
    }

    /// Exactly `length` characters.
    pub fn length(&self, length: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || {
            format!("String must be exactly {length} characters long")
        });
        self.text_rule("length", message, move |text| text.chars().count() == length)
    }

    /// An email address.
    pub fn email(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid email address".to_string());
        self.text_rule("email", message, is_email)
    }

    /// A hyphenated UUID.
    pub fn uuid(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid UUID".to_string());
        self.text_rule("uuid", message, is_uuid)
    }

    /// A URL with a scheme and a host.
    pub fn url(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid url".to_string());
        self.text_rule("url", message, |text| URL.is_match(text))
    }

    /// Matches `pattern`.
    ///
    /// # Example
    /// ```rust
    /// use regex::Regex;
    /// use shape_rs::{Value, string};
    ///
    /// let zip = string().pattern(Regex::new(r"^\d{5}$").unwrap(), Some("Invalid zip"));
    /// assert!(zip.parse(&Value::from("12345")).is_ok());
    /// assert_eq!(zip.parse(&Value::from("1234")).unwrap_err().reason(), "Invalid zip");
    /// ```
    pub fn pattern(&self, pattern: Regex, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid".to_string());
        self.text_rule("pattern", message, move |text| pattern.is_match(text))
    }

    /// A CUID.
    pub fn cuid(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid CUID".to_string());
        self.text_rule("cuid", message, |text| CUID.is_match(text))
    }

    /// Trim surrounding whitespace in both directions.
    pub fn trim(&self) -> Schema {
        fn trimmed(value: &Value) -> Value {
            match value {
                Value::String(text) => Value::from(text.trim()),
                other => other.clone(),
            }
        }
        self.transform(
            Transformer::new()
                .parser(|value, _| Ok(trimmed(value)))
                .serializer(|value, _| Ok(trimmed(value))),
        )
    }

    /// An ISO-8601 UTC datetime string, parsed into a date.
    ///
    /// Serializing writes the date back with millisecond precision.
    pub fn datetime(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid datetime string! Must be UTC".to_string());
        self.transform(
            Transformer::new()
                .parser(move |value, ctx| {
                    let parsed = value
                        .as_str()
                        .filter(|text| DATETIME.is_match(text))
                        .and_then(|text| DateTime::parse_from_rfc3339(text).ok());
                    match parsed {
                        Some(date) => Ok(Value::Date(date.with_timezone(&Utc))),
                        None => Err(ctx.fail(message.clone())),
                    }
                })
                .serializer(|value, ctx| match value {
                    Value::Date(date) => Ok(Value::from(
                        date.to_rfc3339_opts(SecondsFormat::Millis, true),
                    )),
                    other => Err::<Value, Error>(ctx.unexpected_type(other)),
                }),
        )
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    /// Greater than or equal to `bound`.
    pub fn min(&self, bound: f64, message: Option<&str>) -> Schema {
        let message = message_or(message, || {
            format!("Number must be greater than or equal to {bound}")
        });
        self.number_rule("min", message, move |n| n >= bound)
    }

    /// Lower than or equal to `bound`.
    pub fn max(&self, bound: f64, message: Option<&str>) -> Schema {
        let message = message_or(message, || {
            format!("Number must be lower than or equal to {bound}")
        });
        self.number_rule("max", message, move |n| n <= bound)
    }

    /// A TCP/UDP port number.
    pub fn port(&self, message: Option<&str>) -> Schema {
        let message = message_or(message, || "Invalid port".to_string());
        self.number_rule("port", message, |n| {
            n.fract() == 0.0 && (0.0..=65535.0).contains(&n)
        })
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    /// At least `count` items.
    pub fn min_items(&self, count: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || format!("Array must be {count} or more items long"));
        self.items_rule("min_items", message, move |len| len >= count)
    }

    /// At most `count` items.
    pub fn max_items(&self, count: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || format!("Array must be {count} or fewer items long"));
        self.items_rule("max_items", message, move |len| len <= count)
    }

    /// Exactly `count` items.
    pub fn items_length(&self, count: usize, message: Option<&str>) -> Schema {
        let message = message_or(message, || format!("Array must be exactly {count} items long"));
        self.items_rule("items_length", message, move |len| len == count)
    }
}

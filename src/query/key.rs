//! Cache keys.

use serde::Serialize;
use serde_json::Value;

use crate::error::{SdkError, SdkResult};

/// Ordered sequence of values identifying a query.
///
/// Two keys are equivalent iff their canonical JSON serializations are equal.
/// Object fields are written in sorted order, so structurally equal keys built
/// from different values compare equal.
///
/// A part that cannot be represented as JSON (a map with non-string keys, a
/// failing `Serialize` impl) makes the key uncacheable: queries built with it
/// behave as if they had no key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Key {
    parts: Vec<Value>,
    unserializable: bool,
}

impl Key {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part. A part that fails to serialize marks the key uncacheable.
    pub fn with(self, part: impl Serialize) -> Self {
        match serde_json::to_value(part) {
            Ok(value) => self.push(value),
            Err(e) => {
                tracing::warn!(error = %e, "Key part is not serializable, query will not be cached");
                Self {
                    unserializable: true,
                    ..self
                }
            }
        }
    }

    /// Append a part, failing if it cannot be serialized.
    pub fn try_with(self, part: impl Serialize) -> SdkResult<Self> {
        let value = serde_json::to_value(part)
            .map_err(|e| SdkError::Producer(format!("Unserializable key part: {}", e)))?;
        Ok(self.push(value))
    }

    fn push(mut self, value: Value) -> Self {
        self.parts.push(value);
        self
    }

    /// Whether the key identifies a query. See the type docs.
    pub fn is_cacheable(&self) -> bool {
        !self.unserializable
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// Canonical serialization used as the cache lookup token.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        write_canonical(&Value::Array(self.parts.clone()), &mut out);
        out
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl From<&str> for Key {
    fn from(part: &str) -> Self {
        Key::new().with(part)
    }
}

impl From<Vec<Value>> for Key {
    fn from(parts: Vec<Value>) -> Self {
        Self {
            parts,
            unserializable: false,
        }
    }
}

/// Build a [`Key`] from any serializable parts: `key!["pool", pool_id, 5]`.
#[macro_export]
macro_rules! key {
    ($($part:expr),* $(,)?) => {
        $crate::query::Key::new()$(.with(&$part))*
    };
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::ModelError;

/// Output files to produce, with their exact target size in bytes.
///
/// Declaration order is preserved: the write pass visits files in the order
/// they appear in the source JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSizes(pub Vec<(String, u64)>);

impl OutputSizes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a JSON object such as `{"out.dat": 1048576}`.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ModelError::InvalidOutputSizes(e.to_string()))?;

        let Value::Object(map) = value else {
            return Err(ModelError::InvalidOutputSizes(
                "expected a JSON object of file name to byte size".into(),
            ));
        };

        let mut out = Vec::with_capacity(map.len());
        for (name, size) in map {
            let size = size.as_u64().ok_or_else(|| {
                ModelError::InvalidOutputSizes(format!(
                    "size of {name:?} is not a non-negative integer: {size}"
                ))
            })?;
            out.push((name, size));
        }
        Ok(Self(out))
    }

    /// Like [`OutputSizes::parse`], but a malformed specification is logged
    /// and yields an empty set instead of failing the task.
    pub fn parse_or_empty(text: &str) -> Self {
        match Self::parse(text) {
            Ok(sizes) => sizes,
            Err(e) => {
                warn!(target: "wfb.model", error = %e, "ignoring output size specification");
                Self::new()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, size)| (name.as_str(), *size))
    }

    pub fn push(&mut self, name: impl Into<String>, size: u64) {
        self.0.push((name.into(), size));
    }
}

use crate::error::Result;
use crate::generation::Generation;
use crate::tags::TagState;
use faststr::FastStr;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;

/// Generations of the tags an entry was written against, keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<FastStr, Generation>);

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn tags(&self) -> Vec<FastStr> {
        self.0.keys().cloned().collect()
    }

    /// True when every tag still has the generation the entry saw, and the
    /// state carries no tag the snapshot lacks.
    pub fn matches(&self, state: &TagState) -> bool {
        self.0.len() == state.len() && self.is_current_in(state)
    }

    /// Like [`Self::matches`], for a state resolved over a superset of tags.
    pub fn is_current_in(&self, state: &TagState) -> bool {
        self.0
            .iter()
            .all(|(tag, generation)| state.get(tag) == Some(*generation))
    }
}

impl From<&TagState> for Snapshot {
    fn from(state: &TagState) -> Self {
        Self(
            state
                .iter()
                .map(|(tag, g)| (FastStr::new(tag), g))
                .collect(),
        )
    }
}

/// The record stored under a tagged key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Entry<T> {
    /// Required even when `T` is an `Option`; `null` is a stored value.
    #[serde(deserialize_with = "required")]
    pub data: T,
    #[serde(default)]
    pub tags: Snapshot,
}

fn required<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer)
}

impl<T: Serialize> Entry<T> {
    pub fn encode(&self) -> Result<FastStr> {
        Ok(serde_json::to_string(self)?.into())
    }
}

impl<T: DeserializeOwned> Entry<T> {
    /// Anything that is not a `{data, tags}` record fails here.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

pub(crate) fn encode_raw<T: Serialize + ?Sized>(value: &T) -> Result<FastStr> {
    Ok(serde_json::to_string(value)?.into())
}

pub(crate) fn decode_raw<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

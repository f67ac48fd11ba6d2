//! Physical key derivation.
//!
//! | logical        | physical                     |
//! |----------------|------------------------------|
//! | tagged entry   | `[ns]::key`                  |
//! | tag generation | `[ns]::{tags_tag}`           |
//! | raw entry      | `raw_ns` + `key`             |
//!
//! With no namespace set the bracket segment stays, empty (`[]::key`), so a
//! tagged key can never coincide with a raw key built from the same base.
//! The raw scheme never wraps and does not depend on the tagged namespace.

use faststr::FastStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespacer {
    namespace:     Option<FastStr>,
    raw_namespace: Option<FastStr>,
}

fn non_empty(ns: Option<FastStr>) -> Option<FastStr> {
    ns.filter(|s| !s.is_empty())
}

impl Namespacer {
    pub fn new(namespace: Option<FastStr>, raw_namespace: Option<FastStr>) -> Self {
        Self {
            namespace:     non_empty(namespace),
            raw_namespace: non_empty(raw_namespace),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn raw_namespace(&self) -> Option<&str> {
        self.raw_namespace.as_deref()
    }

    /// An empty string clears the namespace.
    pub fn set_namespace(&mut self, namespace: impl Into<FastStr>) {
        self.namespace = non_empty(Some(namespace.into()));
    }

    pub fn set_raw_namespace(&mut self, raw_namespace: impl Into<FastStr>) {
        self.raw_namespace = non_empty(Some(raw_namespace.into()));
    }

    pub fn key_name(&self, base: &str) -> FastStr {
        format!("[{}]::{base}", self.namespace().unwrap_or_default()).into()
    }

    /// Element-wise [`Self::key_name`]; the output lines up with `bases`.
    pub fn key_names<K: AsRef<str>>(&self, bases: &[K]) -> Vec<FastStr> {
        bases.iter().map(|b| self.key_name(b.as_ref())).collect()
    }

    pub fn tag_key_name(&self, tag: &str) -> FastStr {
        self.key_name(&format!("{{tags_{tag}}}"))
    }

    pub fn tag_key_names<T: AsRef<str>>(&self, tags: &[T]) -> Vec<FastStr> {
        tags.iter().map(|t| self.tag_key_name(t.as_ref())).collect()
    }

    pub fn raw_key_name(&self, base: &str) -> FastStr {
        match &self.raw_namespace {
            Some(ns) => format!("{ns}{base}").into(),
            None => FastStr::new(base),
        }
    }
}

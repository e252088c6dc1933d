use std::collections::HashMap;

/// Shared string-keyed property map, reachable from both peers via
/// PROPGET/PROPSET/PROPVAL frames.
///
/// Absent keys read as the empty string, never as an error — controllers
/// probe for properties the host may not have published yet, and an empty
/// answer is the protocol's "not set" signal.
///
/// Not synchronized: the dispatcher is the only writer in the intended
/// single-polling-context design. Integrators polling from several threads
/// must wrap the store in their own lock.
#[derive(Debug, Default)]
pub struct PropertyStore {
    entries: HashMap<String, String>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite-or-insert a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// The stored value, or `""` if the name was never set.
    pub fn get(&self, name: &str) -> &str {
        self.entries.get(name).map(String::as_str).unwrap_or("")
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no property has been set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::collections::HashMap;

use tracing::debug;

use crate::attributes::AttrSet;
use crate::label::normalize_link_label;

/// Target of a `[label]: url "title" {attrs}` definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    pub url: String,
    pub title: Option<String>,
    pub attrs: Option<AttrSet>,
}

/// Link and image definitions collected while segmenting a document.
#[derive(Clone, Debug, Default)]
pub struct ReferenceRegistry {
    entries: HashMap<String, Reference>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a definition; a later definition of the same label replaces the earlier one.
    pub fn define(&mut self, label: &str, reference: Reference) {
        let key = normalize_link_label(label);
        debug!(label = %key, url = %reference.url, "reference defined");
        if self.entries.insert(key, reference).is_some() {
            debug!(label, "reference redefined, keeping the latest");
        }
    }

    pub fn resolve(&self, label: &str) -> Option<&Reference> {
        self.entries.get(&normalize_link_label(label))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

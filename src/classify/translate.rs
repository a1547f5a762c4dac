use std::collections::HashMap;

/// Raw model labels and the object names they translate to.
const DEFAULT_TRANSLATIONS: &[(&str, &str)] = &[
    ("person", "pedestrian"),
    ("car", "car"),
    ("truck", "truck"),
    ("bicycle", "bike"),
    ("motorcycle", "motorbike"),
    ("bus", "bus"),
];

/// Maps raw model class labels to canonical object names.
///
/// Labels without an entry pass through unchanged.
#[derive(Clone, Debug)]
pub struct Translator {
    table: HashMap<String, String>,
}

impl Translator {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_TRANSLATIONS
                .iter()
                .map(|(raw, name)| (raw.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// Add or replace translations on top of the defaults.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (raw, name) in overrides {
            self.table.insert(raw.into(), name.into());
        }
        self
    }

    pub fn translate<'a>(&'a self, raw: &'a str) -> &'a str {
        self.table.get(raw).map(String::as_str).unwrap_or(raw)
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

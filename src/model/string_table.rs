use serde::{Deserialize, Serialize};

/// Shape-wide list of names referenced by index from nodes, objects,
/// sequences and detail levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringTable {
    strings: Vec<String>,
    case_sensitive: bool,
}

impl Default for StringTable {
    fn default() -> Self {
        Self {
            strings: Vec::new(),
            case_sensitive: false,
        }
    }
}

impl StringTable {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            strings: Vec::new(),
            case_sensitive,
        }
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = case_sensitive;
    }

    /// Index of `s`, inserting it if no equal entry exists. The first
    /// spelling inserted is the one kept.
    pub fn add(&mut self, s: &str) -> i32 {
        if let Some(i) = self.find(s) {
            return i;
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as i32
    }

    /// Append without de-duplication; used when loading so indices stay
    /// exactly as stored.
    pub fn push_raw(&mut self, s: String) {
        self.strings.push(s);
    }

    pub fn find(&self, s: &str) -> Option<i32> {
        self.strings
            .iter()
            .position(|e| {
                if self.case_sensitive {
                    e == s
                } else {
                    e.eq_ignore_ascii_case(s)
                }
            })
            .map(|i| i as i32)
    }

    /// Empty for -1 and out-of-range indices.
    pub fn get(&self, index: i32) -> &str {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.strings.iter()
    }
}

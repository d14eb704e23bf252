//! A centralized string interning system that stores unique strings only once in memory.
//!
//! Used for identifiers, macro names, and string-literal payloads so the rest of
//! the pipeline can compare names by a cheap `StringId` instead of hashing text
//! repeatedly (hot in the preprocessor's macro table and the parser's scope chain).

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(u32);

impl StringId {
    pub fn resolve<'a>(self, table: &'a StringTable) -> &'a str {
        table.resolve(self)
    }

    pub fn eq_str(self, table: &StringTable, other: &str) -> bool {
        table.resolve(self) == other
    }
}

/// Vec<Box<str>> for O(1) id -> string resolution, FxHashMap for O(1) string -> id interning.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<Box<str>>,
    string_to_id: FxHashMap<Box<str>, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.string_to_id.get(s) {
            return *id;
        }

        let id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.string_to_id.insert(boxed, id);
        id
    }

    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_string_returns_same_id() {
        let mut t = StringTable::new();
        let a = t.intern("foo");
        let b = t.intern("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut t = StringTable::new();
        let a = t.intern("foo");
        let b = t.intern("bar");
        assert_ne!(a, b);
        assert_eq!(a.resolve(&t), "foo");
        assert_eq!(b.resolve(&t), "bar");
    }
}

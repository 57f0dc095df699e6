use super::error::EngineError;
use super::term::Name;
use indexmap::IndexMap;
use std::{borrow::Cow, collections::HashMap};

/// Issues fresh names and keeps the name ↔ display-string mapping.
///
/// One allocator belongs to exactly one interpreter. Every operation that may
/// alpha-convert takes it by `&mut`.
#[derive(Clone, Debug, Default)]
pub struct NameAllocator {
    display: IndexMap<Name, String>,
    reverse: HashMap<String, Name>,
    next: Name,
}

impl NameAllocator {
    /// `next` is raised past every name already in `display` if needed.
    pub fn new(display: IndexMap<Name, String>, next: Name) -> Self {
        let next = display.keys().map(|name| name.succ()).fold(next, Ord::max);
        let reverse = display
            .iter()
            .map(|(name, string)| (string.clone(), *name))
            .collect();
        Self {
            display,
            reverse,
            next,
        }
    }

    /// Returns the name already displayed as `string`, or issues a new one.
    pub fn register(&mut self, string: &str) -> Name {
        if let Some(&name) = self.reverse.get(string) {
            return name;
        }
        let name = self.bump();
        self.display.insert(name, string.to_owned());
        self.reverse.insert(string.to_owned(), name);
        name
    }

    /// Issues a fresh name displayed like `existing` plus as many `'` as it
    /// takes to be unused.
    pub fn lease(&mut self, existing: Name) -> Result<Name, EngineError> {
        let base = self
            .display
            .get(&existing)
            .ok_or(EngineError::UnknownName(existing))?;
        let mut string = format!("{}'", base);
        while self.reverse.contains_key(&string) {
            string.push('\'');
        }
        let name = self.bump();
        tracing::trace!(?existing, ?name, display = %string, "leased name");
        self.display.insert(name, string.clone());
        self.reverse.insert(string, name);
        Ok(name)
    }

    pub fn peek_next(&self) -> Name {
        self.next
    }

    /// Reserves `len` consecutive names with no display strings. They are for
    /// intermediate renaming only and must not survive into a live term.
    pub fn scratch(&mut self, len: usize) -> Vec<Name> {
        let start = self.peek_next();
        self.next = Name(start.0 + len);
        (start.0..start.0 + len).map(Name).collect()
    }

    pub fn display(&self, name: Name) -> Option<&str> {
        self.display.get(&name).map(String::as_str)
    }

    pub fn lookup(&self, string: &str) -> Option<Name> {
        self.reverse.get(string).copied()
    }

    pub fn label(&self, name: Name) -> Cow<'_, str> {
        match self.display(name) {
            Some(string) => Cow::Borrowed(string),
            None => Cow::Owned(name.to_string()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.display.len()
    }

    fn bump(&mut self) -> Name {
        let name = self.next;
        self.next = name.succ();
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(names: &[&str]) -> NameAllocator {
        let mut allocator = NameAllocator::default();
        for name in names {
            allocator.register(name);
        }
        allocator
    }

    #[test]
    fn lease_appends_minimal_marks() {
        let mut names = allocator(&["c", "c'"]);
        let c = names.lookup("c").unwrap();

        let fresh = names.lease(c).unwrap();
        assert_eq!(names.display(fresh), Some("c''"));

        let again = names.lease(c).unwrap();
        assert_eq!(names.display(again), Some("c'''"));
        assert_ne!(fresh, again);
    }

    #[test]
    fn lease_never_reuses_a_displayed_name() {
        let mut names = allocator(&["x", "y"]);
        let x = names.lookup("x").unwrap();
        let before = names.len();
        let fresh = names.lease(x).unwrap();
        assert_eq!(names.len(), before + 1);
        assert_ne!(Some(fresh), names.lookup("x"));
        assert_ne!(Some(fresh), names.lookup("y"));
    }

    #[test]
    fn lease_of_unregistered_name_fails() {
        let mut names = allocator(&["a"]);
        assert_eq!(
            names.lease(Name(40)),
            Err(EngineError::UnknownName(Name(40)))
        );
    }

    #[test]
    fn peek_predicts_next_lease() {
        let mut names = allocator(&["a"]);
        let a = names.lookup("a").unwrap();
        let predicted = names.peek_next();
        assert_eq!(names.lease(a).unwrap(), predicted);
    }

    #[test]
    fn scratch_block_is_disjoint_from_later_leases() {
        let mut names = allocator(&["a"]);
        let a = names.lookup("a").unwrap();
        let block = names.scratch(3);
        let fresh = names.lease(a).unwrap();
        assert_eq!(block.len(), 3);
        assert!(!block.contains(&fresh));
        assert!(block.iter().all(|name| names.display(*name).is_none()));
    }

    #[test]
    fn new_raises_counter_past_mapping() {
        let names = NameAllocator::new(
            IndexMap::from([(Name(0), "a".to_owned()), (Name(5), "b".to_owned())]),
            Name(2),
        );
        assert_eq!(names.peek_next(), Name(6));
        assert_eq!(names.lookup("b"), Some(Name(5)));
    }
}

//! Shared append-only registries.
//!
//! Plugins push entries (syntax extensions, stringify handlers, commands)
//! and keep the returned [`EntryId`]. Teardown retracts by id, so two
//! plugins registering equal values never remove each other's entries.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identity of one registered entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

struct Entries<T> {
    next_id: u64,
    items: Vec<(EntryId, T)>,
}

/// Append-only list shared between plugins and the stage that consumes it.
///
/// Cloning yields another handle to the same list.
pub struct Registry<T> {
    inner: Rc<RefCell<Entries<T>>>,
}

impl<T> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Entries {
                next_id: 0,
                items: Vec::new(),
            })),
        }
    }

    /// Append `item`, returning its identity.
    pub fn push(&self, item: T) -> EntryId {
        let mut entries = self.inner.borrow_mut();
        entries.next_id += 1;
        let id = EntryId(entries.next_id);
        entries.items.push((id, item));
        id
    }

    /// Remove the entry with `id`. Returns `None` if it was already retracted.
    pub fn retract(&self, id: EntryId) -> Option<T> {
        let mut entries = self.inner.borrow_mut();
        let index = entries.items.iter().position(|(entry, _)| *entry == id)?;
        Some(entries.items.remove(index).1)
    }

    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.inner.borrow().items.iter().any(|(entry, _)| *entry == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Registry<T> {
    /// Current entries in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner
            .borrow()
            .items
            .iter()
            .map(|(_, item)| item.clone())
            .collect()
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.borrow().items.iter().map(|(_, item)| item))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retract_by_identity() {
        let registry = Registry::new();
        let first = registry.push("directive");
        let second = registry.push("directive");
        let other = registry.clone();

        assert_eq!(other.retract(first), Some("directive"));
        assert_eq!(registry.retract(first), None);
        assert!(registry.contains(second));
        assert_eq!(registry.snapshot(), vec!["directive"]);
    }

    #[test]
    fn test_order_is_preserved() {
        let registry = Registry::new();
        let a = registry.push(1);
        registry.push(2);
        registry.push(3);
        registry.retract(a);
        registry.push(4);
        assert_eq!(registry.snapshot(), vec![2, 3, 4]);
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
    }
}

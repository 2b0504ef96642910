//! Authority-owned values that notify observers on every change
//!
//! A `Replicated<T>` is readable from anywhere but only writable through the
//! component that owns it, which in turn only lives on the authority. Every
//! accepted write synchronously invokes the registered observers with the
//! previous and current value, in the order the observers subscribed. The
//! network layer subscribes here to mirror state to clients; gameplay code
//! subscribes to react locally.
//!
//! Observers are plain boxed closures held in an explicit list. Dropping the
//! owning component drops its observers, so nothing can fire after teardown.

use std::fmt;

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Box<dyn FnMut(&T, &T) + Send>;

/// A single server-authoritative value with change notification
pub struct Replicated<T> {
    value: T,
    observers: Vec<(SubscriptionId, Observer<T>)>,
    next_subscription: u64,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Stores `value` and notifies observers when it differs from the current one
    ///
    /// Returns true if the value changed. Writing an equal value is a no-op and
    /// nobody is notified, matching how replicated variables only emit deltas.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }

        let previous = std::mem::replace(&mut self.value, value);
        for (_, observer) in self.observers.iter_mut() {
            observer(&previous, &self.value);
        }
        true
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&T, &T) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicated")
            .field("value", &self.value)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A single mutation applied to a `ReplicatedList`
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    Added { index: usize, value: T },
    Removed { index: usize, value: T },
    Updated { index: usize, previous: T, current: T },
    Cleared,
}

type ListObserver<T> = Box<dyn FnMut(&ListChange<T>, &[T]) + Send>;

/// Ordered server-authoritative list with per-mutation notification
///
/// Observers receive the change plus the full list after the change, which
/// lets the network layer forward whole-roster updates without keeping its
/// own copy.
pub struct ReplicatedList<T> {
    items: Vec<T>,
    observers: Vec<(SubscriptionId, ListObserver<T>)>,
    next_subscription: u64,
}

impl<T: Clone + PartialEq> ReplicatedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.iter().position(predicate)
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value.clone());
        let index = self.items.len() - 1;
        self.notify(ListChange::Added { index, value });
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let value = self.items.remove(index);
        self.notify(ListChange::Removed {
            index,
            value: value.clone(),
        });
        Some(value)
    }

    /// Replaces the element at `index`, notifying only when it actually changed
    pub fn set(&mut self, index: usize, value: T) -> bool {
        let Some(slot) = self.items.get_mut(index) else {
            return false;
        };
        if *slot == value {
            return false;
        }
        let previous = std::mem::replace(slot, value.clone());
        self.notify(ListChange::Updated {
            index,
            previous,
            current: value,
        });
        true
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.notify(ListChange::Cleared);
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ListChange<T>, &[T]) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn notify(&mut self, change: ListChange<T>) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&change, &self.items);
        }
    }
}

impl<T: Clone + PartialEq> Default for ReplicatedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReplicatedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedList")
            .field("items", &self.items)
            .field("observers", &self.observers.len())
            .finish()
    }
}

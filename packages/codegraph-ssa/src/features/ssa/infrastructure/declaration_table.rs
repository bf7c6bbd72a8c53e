/*
 * Declaration Table
 *
 * Promise entries for bodies whose construction is deferred:
 * - `declare` registers a name → target and queues it (FIFO)
 * - `next` hands out the oldest queued entry and marks it Building
 * - `mark_built` completes it
 *
 * Front-ends declare every top-level function/method during the
 * declaration pass (so forward references resolve by name), then drain
 * the queue once top-level code has been built.
 */

use ahash::AHashMap;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationState {
    Declared,
    Building,
    Built,
}

#[derive(Debug, Clone)]
struct DeclarationEntry<T> {
    target: T,
    state: DeclarationState,
}

#[derive(Debug)]
pub struct DeclarationTable<T> {
    entries: AHashMap<String, DeclarationEntry<T>>,
    queue: VecDeque<String>,
}

impl<T> Default for DeclarationTable<T> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<T: Clone> DeclarationTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. Returns false if the name is already taken.
    pub fn declare(&mut self, name: impl Into<String>, target: T) -> bool {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(
            name.clone(),
            DeclarationEntry {
                target,
                state: DeclarationState::Declared,
            },
        );
        self.queue.push_back(name);
        true
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name).map(|e| &e.target)
    }

    pub fn state(&self, name: &str) -> Option<DeclarationState> {
        self.entries.get(name).map(|e| e.state)
    }

    /// Pop the oldest entry that is still `Declared`
    pub fn next(&mut self) -> Option<(String, T)> {
        while let Some(name) = self.queue.pop_front() {
            if let Some(entry) = self.entries.get_mut(&name) {
                if entry.state == DeclarationState::Declared {
                    entry.state = DeclarationState::Building;
                    return Some((name, entry.target.clone()));
                }
            }
        }
        None
    }

    pub fn mark_built(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.state = DeclarationState::Built;
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

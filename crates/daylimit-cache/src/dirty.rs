//! Dirty-set tracking.
//!
//! The single point of serialization between the consume path (producer)
//! and the sync worker (consumer): a concurrent set of remaining-key names
//! whose fast-store value has diverged from the record store since the
//! last successful sync of that key.

use dashmap::DashSet;

/// A concurrent set of dirty key names.
///
/// Additions are idempotent; removal is bulk after a successful sync.
/// No ordering guarantees, no per-key timestamps. Process-local: with
/// more than one engine instance against the same fast store, each
/// instance only tracks its own consumes.
#[derive(Debug, Default)]
pub struct DirtySet {
    keys: DashSet<String>,
}

impl DirtySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key dirty. Returns `true` if the key was not already present.
    pub fn add(&self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    /// Copy the current contents into a list. The set itself is untouched;
    /// callers remove keys only after a successful write-back.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.key().clone()).collect()
    }

    /// Remove the given keys (typically the subset a sync run wrote back).
    pub fn remove_all<S: AsRef<str>>(&self, keys: &[S]) {
        for key in keys {
            self.keys.remove(key.as_ref());
        }
    }

    /// Number of dirty keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are dirty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every key (used when the cache is cleared wholesale).
    pub fn clear(&self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let dirty = DirtySet::new();
        assert!(dirty.add("limits:remaining:2025:03:15"));
        assert!(!dirty.add("limits:remaining:2025:03:15"));
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn snapshot_does_not_drain() {
        let dirty = DirtySet::new();
        dirty.add("a");
        dirty.add("b");

        let snap = dirty.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(dirty.len(), 2);
    }

    #[test]
    fn remove_all_clears_only_given_keys() {
        let dirty = DirtySet::new();
        dirty.add("a");
        dirty.add("b");
        dirty.add("c");

        dirty.remove_all(&["a", "c"]);
        assert_eq!(dirty.snapshot(), vec!["b".to_string()]);
    }

    #[test]
    fn concurrent_adds() {
        let dirty = std::sync::Arc::new(DirtySet::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let dirty = dirty.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        dirty.add(format!("key:{}", (t * 100 + i) % 50));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(dirty.len(), 50);
    }
}

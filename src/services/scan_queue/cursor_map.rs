// Insertion-ordered map with a resumable pruning cursor
// Each pruning pass visits at most a fixed number of entries and remembers
// where it stopped, so memory stays bounded without full sweeps.

use indexmap::IndexMap;

#[derive(Debug)]
pub struct CursorMap<V> {
    entries: IndexMap<String, V>,
    /// Index of the next entry a pruning pass will visit
    cursor: usize,
}

impl<V> Default for CursorMap<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            cursor: 0,
        }
    }
}

impl<V> CursorMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and rewind the cursor
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    /// Visit up to `budget` entries from the saved cursor, removing those
    /// for which `expired` holds. Wraps to the start once the end is reached.
    /// Returns the number of entries removed.
    pub fn prune<F>(&mut self, budget: usize, expired: F) -> usize
    where
        F: Fn(&V) -> bool,
    {
        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }

        let mut visited = 0;
        let mut removed = 0;
        while visited < budget && self.cursor < self.entries.len() {
            visited += 1;
            let stale = self
                .entries
                .get_index(self.cursor)
                .is_some_and(|(_, value)| expired(value));

            if stale {
                // The last entry moves into `cursor` and is visited next
                self.entries.swap_remove_index(self.cursor);
                removed += 1;
            } else {
                self.cursor += 1;
            }
        }

        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }
        removed
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }
}

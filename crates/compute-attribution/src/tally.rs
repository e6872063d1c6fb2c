use {
    rustc_hash::FxHashMap,
    std::{borrow::Borrow, hash::Hash},
};

///
/// Insertion-ordered accumulator of `u64` totals per key.
///
/// Keeps the order in which keys were first seen so rankings can break ties deterministically.
/// Every operation is O(1) except [`OrderedTally::ranked`].
///
#[derive(Debug, Clone)]
pub struct OrderedTally<K> {
    index: FxHashMap<K, usize>,
    entries: Vec<(K, u64)>,
}

impl<K> Default for OrderedTally<K> {
    fn default() -> Self {
        Self {
            index: FxHashMap::default(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("tally overflow")]
pub struct TallyOverflow;

impl<K> OrderedTally<K>
where
    K: Clone + Hash + Eq,
{
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Adds `amount` to the total of `key`, inserting it at the back if never seen.
    ///
    /// Returns the new total.
    pub fn add(&mut self, key: K, amount: u64) -> Result<u64, TallyOverflow> {
        match self.index.get(&key) {
            Some(&i) => {
                let total = &mut self.entries[i].1;
                *total = total.checked_add(amount).ok_or(TallyOverflow)?;
                Ok(*total)
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, amount));
                Ok(amount)
            }
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    ///
    /// Removes every key for which `keep` returns false, preserving the order of the rest.
    ///
    pub fn retain(&mut self, mut keep: impl FnMut(&K, u64) -> bool) {
        self.entries.retain(|(k, v)| keep(k, *v));
        self.index.clear();
        for (i, (k, _)) in self.entries.iter().enumerate() {
            self.index.insert(k.clone(), i);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> u128 {
        self.entries.iter().map(|(_, v)| *v as u128).sum()
    }

    pub fn max_value(&self) -> Option<u64> {
        self.entries.iter().map(|(_, v)| *v).max()
    }

    ///
    /// Iterates entries in first-seen order.
    ///
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> + '_ {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    ///
    /// Returns at most `limit` entries sorted by total descending; ties keep first-seen order.
    ///
    pub fn ranked(&self, limit: usize) -> Vec<(K, u64)> {
        let mut ranked = self.entries.clone();
        // stable
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }
}

impl<K> FromIterator<(K, u64)> for OrderedTally<K>
where
    K: Clone + Hash + Eq,
{
    ///
    /// Saturating on overflow.
    ///
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut tally = OrderedTally::new();
        for (k, v) in iter {
            if tally.add(k.clone(), v).is_err() {
                if let Some(&i) = tally.index.get(&k) {
                    tally.entries[i].1 = u64::MAX;
                }
            }
        }
        tally
    }
}

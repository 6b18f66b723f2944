//! HashTreeMap: hash map with tree bins, stable handles and a fail-fast cursor.

use crate::config::MapConfig;
use crate::error::{ConfigError, IterError};
use crate::hashing::make_hash;
use crate::table::{Node, Placement, Table};
use crate::tie_break::{NaturalOrder, TieBreak, Unordered};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use slotmap::DefaultKey;
use std::collections::hash_map::RandomState;

/// Stable reference to an entry. Survives resizes and bin conversions;
/// resolves to `None` once the entry is removed, and never to a different
/// entry afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K, V, S, T>(&self, map: &'a HashTreeMap<K, V, S, T>) -> Option<&'a K> {
        map.table.nodes.get(self.0).map(|n| &n.key)
    }

    pub fn value<'a, K, V, S, T>(&self, map: &'a HashTreeMap<K, V, S, T>) -> Option<&'a V> {
        map.table.nodes.get(self.0).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, S, T>(
        &self,
        map: &'a mut HashTreeMap<K, V, S, T>,
    ) -> Option<&'a mut V> {
        map.table.nodes.get_mut(self.0).map(|n| &mut n.value)
    }
}

/// A hash map whose overfull bins turn into red-black trees.
///
/// Keys need only `Eq + Hash`. Each key is hashed once, on insertion; the
/// spread hash is cached with the entry and resizes never call `Hash` again.
///
/// Keys that share a full hash are ordered inside a tree bin by `T`. The
/// default [`Unordered`] tells them apart with `Eq` alone, which costs one
/// equality check per such key. [`NaturalOrder`] uses `K: Ord` instead and
/// keeps those lookups logarithmic.
///
/// Iteration order is unspecified. All mutation goes through `&mut self`,
/// so borrowing iterators cannot observe concurrent changes; a detached
/// [`Cursor`] can, and reports them as [`IterError::ConcurrentModification`].
#[derive(Clone)]
pub struct HashTreeMap<K, V, S = RandomState, T = Unordered> {
    hasher: S,
    pub(crate) table: Table<K, V, T>,
}

impl<K, V> HashTreeMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Room for roughly `capacity` entries before the first resize.
    /// Capacities above the maximum table length are clamped.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    pub fn with_config(cfg: MapConfig) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(cfg, RandomState::new())
    }
}

impl<K: Ord, V> HashTreeMap<K, V, RandomState, NaturalOrder> {
    /// Empty map whose tree bins order equal-hash keys by `K: Ord`.
    pub fn with_natural_order() -> Self {
        Self::with_tie_break(RandomState::new(), NaturalOrder)
    }
}

impl<K, V, S: Default, T: Default> Default for HashTreeMap<K, V, S, T> {
    fn default() -> Self {
        Self::with_tie_break(S::default(), T::default())
    }
}

impl<K, V, S> HashTreeMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            table: Table::new(),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let cfg = MapConfig::default().with_initial_capacity(capacity);
        Self {
            hasher,
            table: Table::with_config(&cfg),
        }
    }

    pub fn with_config_and_hasher(cfg: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        Self::with_config_hasher_and_tie_break(cfg, hasher, Unordered)
    }
}

impl<K, V, S, T> HashTreeMap<K, V, S, T> {
    pub fn with_tie_break(hasher: S, tie: T) -> Self {
        Self {
            hasher,
            table: Table::with_tie_break(tie),
        }
    }

    pub fn with_config_hasher_and_tie_break(
        cfg: MapConfig,
        hasher: S,
        tie: T,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            hasher,
            table: Table::with_config_and_tie_break(&cfg, tie),
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Current number of bins; zero until the first insertion.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Structural generation: changes whenever an entry is added or
    /// removed, and on `clear`.
    pub fn modification_count(&self) -> u64 {
        self.table.mod_count
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn tie_break(&self) -> &T {
        &self.table.tie
    }

    /// Remove every entry. The bin table keeps its length.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.table.nodes.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.table.nodes.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Detached fail-fast cursor positioned before the first entry in bin
    /// order.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            expected: self.table.mod_count,
            next: self.table.first_from(0),
            current: None,
        }
    }

    /// Remove the entry behind `handle`. `None` if it is already gone.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        self.table
            .remove_node(handle.raw_handle())
            .map(|n| (n.key, n.value))
    }

    /// Linear scan.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }
}

impl<K, V, S, T> HashTreeMap<K, V, S, T>
where
    K: Eq + Hash,
    S: BuildHasher,
    T: TieBreak<K>,
{
    pub(crate) fn hash_of<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        make_hash(&self.hasher, q)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        self.table.find(self.hash_of(q), q).map(Handle::new)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let k = self.table.find(self.hash_of(q), q)?;
        Some(&self.table.nodes[k].value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let k = self.table.find(self.hash_of(q), q)?;
        let n = &self.table.nodes[k];
        Some((&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let k = self.table.find(self.hash_of(q), q)?;
        Some(&mut self.table.nodes[k].value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        self.table.find(self.hash_of(q), q).is_some()
    }

    /// Insert or replace. Returns the previous value; an existing entry keeps
    /// its original key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        match self.table.place(hash, key, value) {
            Placement::Vacant(_) => None,
            Placement::Occupied(k, value) => {
                Some(core::mem::replace(&mut self.table.nodes[k].value, value))
            }
        }
    }

    /// Insert only if `key` is absent. When present, the stored value is
    /// kept and returned, and `value` is dropped.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = self.hash_of(&key);
        match self.table.place(hash, key, value) {
            Placement::Vacant(_) => None,
            Placement::Occupied(k, _) => Some(&self.table.nodes[k].value),
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let hash = self.hash_of(q);
        self.table.remove(hash, q).map(|n| (n.key, n.value))
    }

    /// Grow ahead of `additional` insertions.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Keep only the entries for which `f` returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut cur = self.table.first_from(0);
        while let Some(k) = cur {
            cur = self.table.successor(k);
            let n = &mut self.table.nodes[k];
            if !f(&n.key, &mut n.value) {
                self.table.remove_node(k);
            }
        }
    }
}

/// Fail-fast traversal that does not borrow the map between steps.
///
/// The cursor records the map's structural generation when created. Every
/// step first compares it with the map's current generation and fails with
/// [`IterError::ConcurrentModification`] on mismatch. Removing through
/// [`remove_current`](Cursor::remove_current) resynchronizes the cursor, so
/// removal during traversal stays legal. Replacing a value is not a
/// structural change.
///
/// A cursor must only be used with the map that created it.
#[derive(Debug, Clone)]
pub struct Cursor {
    expected: u64,
    next: Option<DefaultKey>,
    current: Option<DefaultKey>,
}

impl Cursor {
    /// Step to the next entry. `Ok(None)` once the traversal is complete.
    pub fn advance<'m, K, V, S, T>(
        &mut self,
        map: &'m HashTreeMap<K, V, S, T>,
    ) -> Result<Option<(&'m K, &'m V)>, IterError> {
        IterError::check(self.expected, map.table.mod_count)?;
        let Some(k) = self.next else {
            return Ok(None);
        };
        let Some(n) = map.table.nodes.get(k) else {
            return Ok(None);
        };
        self.current = Some(k);
        self.next = map.table.successor(k);
        Ok(Some((&n.key, &n.value)))
    }

    /// Remove the entry returned by the last `advance`.
    pub fn remove_current<K, V, S, T>(
        &mut self,
        map: &mut HashTreeMap<K, V, S, T>,
    ) -> Result<(K, V), IterError> {
        IterError::check(self.expected, map.table.mod_count)?;
        let k = self.current.take().ok_or(IterError::NoCurrentEntry)?;
        let n = map
            .table
            .remove_node(k)
            .ok_or(IterError::NoCurrentEntry)?;
        self.expected = map.table.mod_count;
        Ok((n.key, n.value))
    }
}

/// Iterator over entries in arbitrary order.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Iterator over entries with mutable values, in arbitrary order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &mut n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Owning iterator, arbitrary order.
pub struct IntoIter<K, V> {
    it: slotmap::basic::IntoIter<DefaultKey, Node<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<(K, V)> {
        self.it.next().map(|(_, n)| (n.key, n.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V, S, T> IntoIterator for HashTreeMap<K, V, S, T> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            it: self.table.nodes.into_iter(),
        }
    }
}

impl<'a, K, V, S, T> IntoIterator for &'a HashTreeMap<K, V, S, T> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S, T> IntoIterator for &'a mut HashTreeMap<K, V, S, T> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V, S, T> Extend<(K, V)> for HashTreeMap<K, V, S, T>
where
    K: Eq + Hash,
    S: BuildHasher,
    T: TieBreak<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S, T> FromIterator<(K, V)> for HashTreeMap<K, V, S, T>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    T: TieBreak<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S, T> PartialEq for HashTreeMap<K, V, S, T>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    T: TieBreak<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, S, T> Eq for HashTreeMap<K, V, S, T>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    T: TieBreak<K>,
{
}

impl<K, Q, V, S, T> Index<&Q> for HashTreeMap<K, V, S, T>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
    T: TieBreak<K> + TieBreak<Q>,
{
    type Output = V;

    /// Panics if the key is absent.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in HashTreeMap")
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, T> fmt::Debug for HashTreeMap<K, V, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

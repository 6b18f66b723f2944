//! LinkedHashTreeMap: a HashTreeMap with a doubly linked order list.
//!
//! Layering
//! - `HashTreeMap<K, Linked<V>, S, T>` owns the entries, bins and tree bins.
//! - This layer threads `before`/`after` arena links through the stored
//!   values and keeps `head`/`tail`, giving a deterministic iteration order.
//! - Lookups and removals only need the inner map's bounds; the eviction
//!   policy is consulted by insertions alone.
//! - `iter` follows the order links in place. `iter_mut` cannot hand out
//!   disjoint `&mut` borrows by following them, so it ranks every entry and
//!   buffers one slot per entry first: each call allocates O(len) memory
//!   before yielding anything.
//!
//! Order
//! - `OrderPolicy::Insertion`: entries stay where they were first inserted;
//!   replacing a value does not move it.
//! - `OrderPolicy::Access`: every successful `get`/`get_mut`, and every insert
//!   that hits an existing key, moves the entry to the tail. Such a move is a
//!   structural change for cursors.
//!
//! Eviction
//! - After each insertion of a new key the eviction policy sees the head
//!   (oldest) entry and the current length; if it says so, that one entry is
//!   removed.

use crate::config::MapConfig;
use crate::error::{ConfigError, IterError};
use crate::hash_tree_map::HashTreeMap;
use crate::table::{Node, Nodes, Placement};
use crate::tie_break::{TieBreak, Unordered};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use log::debug;
use slotmap::{DefaultKey, SecondaryMap};
use std::collections::hash_map::RandomState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Order of first insertion.
    #[default]
    Insertion,
    /// Least recently accessed first.
    Access,
}

/// Decides, after each insertion of a new key, whether the oldest entry
/// should be dropped.
///
/// Any `FnMut(&K, &V, usize) -> bool` closure is a policy.
pub trait EvictionPolicy<K, V> {
    /// `oldest` is the head of the order list; `len` counts it.
    fn should_evict(&mut self, oldest: (&K, &V), len: usize) -> bool;
}

/// Keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverEvict;

impl<K, V> EvictionPolicy<K, V> for NeverEvict {
    fn should_evict(&mut self, _oldest: (&K, &V), _len: usize) -> bool {
        false
    }
}

/// Evicts the oldest entry whenever an insertion takes the map past the
/// wrapped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxEntries(pub usize);

impl<K, V> EvictionPolicy<K, V> for MaxEntries {
    fn should_evict(&mut self, _oldest: (&K, &V), len: usize) -> bool {
        len > self.0
    }
}

impl<K, V, F> EvictionPolicy<K, V> for F
where
    F: FnMut(&K, &V, usize) -> bool,
{
    fn should_evict(&mut self, oldest: (&K, &V), len: usize) -> bool {
        self(oldest.0, oldest.1, len)
    }
}

/// Stored value plus its order-list links.
#[derive(Debug, Clone)]
pub(crate) struct Linked<V> {
    pub(crate) value: V,
    before: Option<DefaultKey>,
    after: Option<DefaultKey>,
}

impl<V> Linked<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            before: None,
            after: None,
        }
    }
}

/// Hash map with tree bins and a predictable iteration order.
#[derive(Clone)]
pub struct LinkedHashTreeMap<K, V, S = RandomState, E = NeverEvict, T = Unordered> {
    map: HashTreeMap<K, Linked<V>, S, T>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    policy: OrderPolicy,
    eviction: E,
}

impl<K, V> LinkedHashTreeMap<K, V> {
    /// Insertion-ordered map.
    pub fn new() -> Self {
        Self::with_policy(OrderPolicy::Insertion)
    }

    pub fn with_policy(policy: OrderPolicy) -> Self {
        Self::with_hasher(RandomState::new(), policy)
    }

    pub fn with_config(cfg: MapConfig, policy: OrderPolicy) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(cfg, RandomState::new(), policy, NeverEvict)
    }
}

impl<K, V, E> LinkedHashTreeMap<K, V, RandomState, E> {
    pub fn with_eviction(policy: OrderPolicy, eviction: E) -> Self {
        Self::from_parts(HashTreeMap::new(), policy, eviction)
    }
}

impl<K, V> LinkedHashTreeMap<K, V, RandomState, MaxEntries> {
    /// Access-ordered map holding at most `max_entries` entries, dropping the
    /// least recently used one when full.
    pub fn lru(max_entries: usize) -> Self {
        Self::with_eviction(OrderPolicy::Access, MaxEntries(max_entries))
    }
}

impl<K, V, S> LinkedHashTreeMap<K, V, S> {
    pub fn with_hasher(hasher: S, policy: OrderPolicy) -> Self {
        Self::from_parts(HashTreeMap::with_hasher(hasher), policy, NeverEvict)
    }
}

impl<K, V, S, E> LinkedHashTreeMap<K, V, S, E> {
    pub fn with_config_and_hasher(
        cfg: MapConfig,
        hasher: S,
        policy: OrderPolicy,
        eviction: E,
    ) -> Result<Self, ConfigError> {
        Self::with_tie_break(cfg, hasher, policy, eviction, Unordered)
    }
}

impl<K, V, S, E, T> LinkedHashTreeMap<K, V, S, E, T> {
    /// Fully specified constructor; `tie` orders equal-hash keys inside
    /// tree bins (see [`HashTreeMap`]).
    pub fn with_tie_break(
        cfg: MapConfig,
        hasher: S,
        policy: OrderPolicy,
        eviction: E,
        tie: T,
    ) -> Result<Self, ConfigError> {
        let map = HashTreeMap::with_config_hasher_and_tie_break(cfg, hasher, tie)?;
        Ok(Self::from_parts(map, policy, eviction))
    }

    fn from_parts(map: HashTreeMap<K, Linked<V>, S, T>, policy: OrderPolicy, eviction: E) -> Self {
        Self {
            map,
            head: None,
            tail: None,
            policy,
            eviction,
        }
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }
    pub fn modification_count(&self) -> u64 {
        self.map.modification_count()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.head = None;
        self.tail = None;
    }

    fn nodes(&self) -> &Nodes<K, Linked<V>> {
        &self.map.table.nodes
    }

    fn links(&mut self, k: DefaultKey) -> &mut Linked<V> {
        &mut self.map.table.nodes[k].value
    }

    fn entry_at(&self, k: Option<DefaultKey>) -> Option<(&K, &V)> {
        let n = self.nodes().get(k?)?;
        Some((&n.key, &n.value.value))
    }

    fn link_last(&mut self, k: DefaultKey) {
        let tail = self.tail;
        let l = self.links(k);
        l.before = tail;
        l.after = None;
        match tail {
            Some(t) => self.links(t).after = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
    }

    fn unlink(&mut self, k: DefaultKey) {
        let l = self.links(k);
        let (before, after) = (l.before.take(), l.after.take());
        match before {
            Some(b) => self.links(b).after = after,
            None => self.head = after,
        }
        match after {
            Some(a) => self.links(a).before = before,
            None => self.tail = before,
        }
    }

    /// Record an access to `k`: under access order, move it to the tail.
    fn touch(&mut self, k: DefaultKey) {
        if self.policy == OrderPolicy::Access && self.tail != Some(k) {
            self.unlink(k);
            self.link_last(k);
            self.map.table.mod_count += 1;
        }
    }

    fn remove_node(&mut self, k: DefaultKey) -> Option<(K, V)> {
        self.nodes().get(k)?;
        self.unlink(k);
        self.map
            .table
            .remove_node(k)
            .map(|n| (n.key, n.value.value))
    }

    /// Oldest entry: first inserted, or least recently accessed.
    pub fn front(&self) -> Option<(&K, &V)> {
        self.entry_at(self.head)
    }

    /// Newest entry.
    pub fn back(&self) -> Option<(&K, &V)> {
        self.entry_at(self.tail)
    }

    pub fn pop_front(&mut self) -> Option<(K, V)> {
        self.remove_node(self.head?)
    }

    pub fn pop_back(&mut self) -> Option<(K, V)> {
        self.remove_node(self.tail?)
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> LinkedIter<'_, K, V> {
        LinkedIter {
            nodes: self.nodes(),
            next: self.head,
            remaining: self.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Entries from oldest to newest with mutable values.
    ///
    /// Unlike `iter`, every call allocates: a rank per entry and a buffer of
    /// `len` slots, filled in one pass over the arena before the first item
    /// is returned. That is O(len) time and O(len) extra memory per call.
    pub fn iter_mut(&mut self) -> LinkedIterMut<'_, K, V> {
        let len = self.len();
        let mut rank: SecondaryMap<DefaultKey, usize> = SecondaryMap::with_capacity(len);
        let mut cur = self.head;
        while let Some(k) = cur {
            rank.insert(k, rank.len());
            cur = self.nodes()[k].value.after;
        }
        let mut slots: Vec<Option<(&K, &mut V)>> = (0..len).map(|_| None).collect();
        for (k, n) in self.map.table.nodes.iter_mut() {
            if let Some(&r) = rank.get(k) {
                slots[r] = Some((&n.key, &mut n.value.value));
            }
        }
        LinkedIterMut {
            inner: slots.into_iter().flatten(),
        }
    }

    /// Detached fail-fast cursor from oldest to newest.
    pub fn cursor(&self) -> LinkedCursor {
        LinkedCursor {
            expected: self.map.modification_count(),
            next: self.head,
            current: None,
        }
    }
}

impl<K, V, S, E, T> LinkedHashTreeMap<K, V, S, E, T>
where
    K: Eq + Hash,
    S: BuildHasher,
    T: TieBreak<K>,
{
    /// Lookup that counts as an access.
    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let k = self.map.find(q)?.raw_handle();
        self.touch(k);
        Some(&self.nodes()[k].value.value)
    }

    /// Lookup that never changes the order.
    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        self.map.get(q).map(|l| &l.value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        let k = self.map.find(q)?.raw_handle();
        self.touch(k);
        Some(&mut self.links(k).value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        T: TieBreak<Q>,
    {
        self.map.contains_key(q)
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
        let k = self.map.find(q)?.raw_handle();
        self.remove_node(k)
    }

    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.map.table.assert_invariants();
        let mut count = 0;
        let mut prev = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let l = &self.nodes()[k].value;
            assert_eq!(l.before, prev, "broken before link");
            count += 1;
            assert!(count <= self.len(), "cycle in order list");
            prev = cur;
            cur = l.after;
        }
        assert_eq!(self.tail, prev, "tail is not the last entry");
        assert_eq!(count, self.len(), "order list and bins disagree");
    }
}

impl<K, V, S, E, T> LinkedHashTreeMap<K, V, S, E, T>
where
    K: Eq + Hash,
    S: BuildHasher,
    E: EvictionPolicy<K, V>,
    T: TieBreak<K>,
{
    /// Insert or replace. A new key goes to the tail; a replaced entry keeps
    /// its place unless the map is access-ordered.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.map.hash_of(&key);
        match self.map.table.place(hash, key, Linked::new(value)) {
            Placement::Vacant(k) => {
                self.link_last(k);
                self.evict_eldest();
                None
            }
            Placement::Occupied(k, offered) => {
                let old = core::mem::replace(&mut self.links(k).value, offered.value);
                self.touch(k);
                Some(old)
            }
        }
    }

    /// Insert only if `key` is absent; otherwise return the kept value. A hit
    /// counts as an access.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = self.map.hash_of(&key);
        match self.map.table.place(hash, key, Linked::new(value)) {
            Placement::Vacant(k) => {
                self.link_last(k);
                self.evict_eldest();
                None
            }
            Placement::Occupied(k, _) => {
                self.touch(k);
                Some(&self.nodes()[k].value.value)
            }
        }
    }

    fn evict_eldest(&mut self) {
        let Some(h) = self.head else {
            return;
        };
        let n: &Node<K, Linked<V>> = &self.map.table.nodes[h];
        let len = self.map.len();
        if self.eviction.should_evict((&n.key, &n.value.value), len) {
            self.remove_node(h);
            debug!("evicted eldest entry, {} remain", self.map.len());
        }
    }
}

/// Fail-fast cursor over a [`LinkedHashTreeMap`], oldest to newest.
///
/// Same contract as [`Cursor`](crate::Cursor). Under access order, a `get`
/// that moves an entry is a structural change and fails the next step.
#[derive(Debug, Clone)]
pub struct LinkedCursor {
    expected: u64,
    next: Option<DefaultKey>,
    current: Option<DefaultKey>,
}

impl LinkedCursor {
    pub fn advance<'m, K, V, S, E, T>(
        &mut self,
        map: &'m LinkedHashTreeMap<K, V, S, E, T>,
    ) -> Result<Option<(&'m K, &'m V)>, IterError> {
        IterError::check(self.expected, map.modification_count())?;
        let Some(k) = self.next else {
            return Ok(None);
        };
        let Some(n) = map.nodes().get(k) else {
            return Ok(None);
        };
        self.current = Some(k);
        self.next = n.value.after;
        Ok(Some((&n.key, &n.value.value)))
    }

    pub fn remove_current<K, V, S, E, T>(
        &mut self,
        map: &mut LinkedHashTreeMap<K, V, S, E, T>,
    ) -> Result<(K, V), IterError> {
        IterError::check(self.expected, map.modification_count())?;
        let k = self.current.take().ok_or(IterError::NoCurrentEntry)?;
        let entry = map.remove_node(k).ok_or(IterError::NoCurrentEntry)?;
        self.expected = map.modification_count();
        Ok(entry)
    }
}

pub struct LinkedIter<'a, K, V> {
    nodes: &'a Nodes<K, Linked<V>>,
    next: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for LinkedIter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        let n = self.nodes.get(self.next?)?;
        self.next = n.value.after;
        self.remaining -= 1;
        Some((&n.key, &n.value.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for LinkedIter<'_, K, V> {}

pub struct LinkedIterMut<'a, K, V> {
    inner: core::iter::Flatten<std::vec::IntoIter<Option<(&'a K, &'a mut V)>>>,
}

impl<'a, K, V> Iterator for LinkedIterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, K, V, S, E, T> IntoIterator for &'a LinkedHashTreeMap<K, V, S, E, T> {
    type Item = (&'a K, &'a V);
    type IntoIter = LinkedIter<'a, K, V>;
    fn into_iter(self) -> LinkedIter<'a, K, V> {
        self.iter()
    }
}

impl<K, V, S, E, T> Extend<(K, V)> for LinkedHashTreeMap<K, V, S, E, T>
where
    K: Eq + Hash,
    S: BuildHasher,
    E: EvictionPolicy<K, V>,
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

impl<K, V, S, E, T> FromIterator<(K, V)> for LinkedHashTreeMap<K, V, S, E, T>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    E: EvictionPolicy<K, V> + Default,
    T: TieBreak<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S: Default, E: Default, T: Default> Default for LinkedHashTreeMap<K, V, S, E, T> {
    fn default() -> Self {
        Self::from_parts(
            HashTreeMap::with_tie_break(S::default(), T::default()),
            OrderPolicy::Insertion,
            E::default(),
        )
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, E, T> fmt::Debug for LinkedHashTreeMap<K, V, S, E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

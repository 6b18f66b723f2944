//! Bucket store: the entry arena and the power-of-two bin table.
//!
//! Every entry lives in one slotmap arena and is never moved once inserted;
//! bins refer to entries by arena key. A bin is empty, a singly linked chain
//! threaded through `Node::next`, or a red-black tree (see `tree_bin`) that
//! keeps the same `next` chain alongside its tree links. Tree bins order
//! equal-hash keys with the table's `TieBreak`.
//!
//! Invariants
//! - `bins.len()` is zero (not yet allocated) or a power of two.
//! - Every live node sits in bin `bin_index(node.hash, bins.len())`, and in
//!   exactly one bin chain.
//! - `mod_count` changes on every insertion or removal of an entry, never on
//!   a value replacement.

use crate::config::MapConfig;
use crate::hashing::{
    bin_index, table_size_for, threshold_for, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY,
    MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD,
};
use crate::tie_break::{TieBreak, Unordered};
use crate::tree_bin;
use core::borrow::Borrow;
use log::{debug, trace};
use slotmap::{DefaultKey, SlotMap};

pub(crate) type Nodes<K, V> = SlotMap<DefaultKey, Node<K, V>>;

#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// Spread hash, computed once at insertion.
    pub(crate) hash: u64,
    /// Successor within the bin. Tree bins maintain it too.
    pub(crate) next: Option<DefaultKey>,
    pub(crate) tree: TreeLinks,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V, hash: u64) -> Self {
        Self {
            key,
            value,
            hash,
            next: None,
            tree: TreeLinks::default(),
        }
    }
}

/// Red-black links. Only meaningful while the node is in a tree bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<DefaultKey>,
    pub(crate) left: Option<DefaultKey>,
    pub(crate) right: Option<DefaultKey>,
    /// Predecessor in the bin chain, for O(1) unlinking.
    pub(crate) prev: Option<DefaultKey>,
    pub(crate) red: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Bin {
    #[default]
    Empty,
    Chain(DefaultKey),
    Tree {
        root: DefaultKey,
        first: DefaultKey,
    },
}

impl Bin {
    /// Head of the bin chain.
    pub(crate) fn first(self) -> Option<DefaultKey> {
        match self {
            Bin::Empty => None,
            Bin::Chain(head) => Some(head),
            Bin::Tree { first, .. } => Some(first),
        }
    }
}

/// Outcome of `Table::place`.
pub(crate) enum Placement<V> {
    /// A new entry was created.
    Vacant(DefaultKey),
    /// The key was already present; the offered value is handed back and
    /// the stored entry is untouched.
    Occupied(DefaultKey, V),
}

/// Key comparison used by every lookup: identity first, then `Eq`.
#[inline]
pub(crate) fn keys_match<K, Q>(k: &K, q: &Q) -> bool
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    let k = k.borrow();
    core::ptr::eq(k, q) || k == q
}

/// Order-preserving chain assembly used by resize splits.
#[derive(Debug, Default)]
pub(crate) struct ChainBuilder {
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
    pub(crate) len: usize,
}

impl ChainBuilder {
    pub(crate) fn push<K, V>(&mut self, nodes: &mut Nodes<K, V>, k: DefaultKey) {
        nodes[k].tree.prev = self.tail;
        match self.tail {
            Some(t) => nodes[t].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        self.len += 1;
    }

    /// Terminate the chain and return its head.
    pub(crate) fn finish<K, V>(&self, nodes: &mut Nodes<K, V>) -> Option<DefaultKey> {
        if let Some(t) = self.tail {
            nodes[t].next = None;
        }
        self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Table<K, V, T = Unordered> {
    pub(crate) nodes: Nodes<K, V>,
    pub(crate) bins: Vec<Bin>,
    /// Resize point once allocated; before that, the requested initial
    /// table length (0 selects the default).
    pub(crate) threshold: usize,
    pub(crate) load_factor: f32,
    pub(crate) mod_count: u64,
    pub(crate) tie: T,
}

impl<K, V, T: Default> Table<K, V, T> {
    pub(crate) fn new() -> Self {
        Self::with_tie_break(T::default())
    }

    pub(crate) fn with_config(cfg: &MapConfig) -> Self {
        Self::with_config_and_tie_break(cfg, T::default())
    }
}

impl<K, V, T> Table<K, V, T> {
    /// Unallocated table using the default length and load factor.
    pub(crate) fn with_tie_break(tie: T) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            bins: Vec::new(),
            threshold: 0,
            load_factor: MapConfig::default().load_factor(),
            mod_count: 0,
            tie,
        }
    }

    /// Unallocated table sized from an already validated config.
    pub(crate) fn with_config_and_tie_break(cfg: &MapConfig, tie: T) -> Self {
        Self {
            threshold: table_size_for(cfg.initial_capacity()),
            load_factor: cfg.load_factor(),
            ..Self::with_tie_break(tie)
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.bins.len()
    }

    pub(crate) fn find<Q>(&self, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        T: TieBreak<Q>,
    {
        if self.bins.is_empty() {
            return None;
        }
        match self.bins[bin_index(hash, self.bins.len())] {
            Bin::Empty => None,
            Bin::Chain(head) => {
                let mut cur = Some(head);
                while let Some(k) = cur {
                    let n = &self.nodes[k];
                    if n.hash == hash && keys_match(&n.key, q) {
                        return Some(k);
                    }
                    cur = n.next;
                }
                None
            }
            Bin::Tree { root, .. } => tree_bin::find(&self.nodes, &self.tie, root, hash, q),
        }
    }

    pub(crate) fn remove<Q>(&mut self, hash: u64, q: &Q) -> Option<Node<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        T: TieBreak<Q>,
    {
        let k = self.find(hash, q)?;
        self.remove_node(k)
    }

    /// Unlink `k` from its bin and take it out of the arena. `None` for a
    /// stale key.
    pub(crate) fn remove_node(&mut self, k: DefaultKey) -> Option<Node<K, V>> {
        let hash = self.nodes.get(k)?.hash;
        let i = bin_index(hash, self.bins.len());
        match self.bins[i] {
            Bin::Empty => return None,
            Bin::Chain(head) if head == k => {
                self.bins[i] = self.nodes[k].next.map_or(Bin::Empty, Bin::Chain);
            }
            Bin::Chain(head) => {
                let mut prev = head;
                loop {
                    match self.nodes[prev].next {
                        Some(next) if next == k => break,
                        Some(next) => prev = next,
                        None => return None,
                    }
                }
                self.nodes[prev].next = self.nodes[k].next;
            }
            Bin::Tree { root, first } => {
                self.bins[i] = tree_bin::remove(&mut self.nodes, root, first, k);
            }
        }
        self.mod_count += 1;
        self.nodes.remove(k)
    }

    /// Drop every entry, keeping the table length.
    pub(crate) fn clear(&mut self) {
        self.mod_count += 1;
        if !self.nodes.is_empty() {
            self.nodes.clear();
            self.bins.fill(Bin::Empty);
        }
    }

    /// First entry in bin order at or after bin `start`.
    pub(crate) fn first_from(&self, start: usize) -> Option<DefaultKey> {
        self.bins.get(start..)?.iter().find_map(|b| b.first())
    }

    /// Entry following `k` in bin order.
    pub(crate) fn successor(&self, k: DefaultKey) -> Option<DefaultKey> {
        let n = self.nodes.get(k)?;
        n.next
            .or_else(|| self.first_from(bin_index(n.hash, self.bins.len()) + 1))
    }
}

impl<K, V, T: TieBreak<K>> Table<K, V, T> {
    /// Insert `key` unless an equal key is present. Allocates the table on
    /// first use, treeifies overlong chains and grows the table past the
    /// threshold.
    pub(crate) fn place(&mut self, hash: u64, key: K, value: V) -> Placement<V>
    where
        K: Eq,
    {
        if self.bins.is_empty() {
            self.resize();
        }
        let i = bin_index(hash, self.bins.len());
        let k = match self.bins[i] {
            Bin::Empty => {
                let k = self.nodes.insert(Node::new(key, value, hash));
                self.bins[i] = Bin::Chain(k);
                k
            }
            Bin::Chain(head) => {
                let mut last = head;
                let mut count = 1;
                loop {
                    let n = &self.nodes[last];
                    if n.hash == hash && keys_match(&n.key, &key) {
                        return Placement::Occupied(last, value);
                    }
                    match n.next {
                        Some(next) => {
                            last = next;
                            count += 1;
                        }
                        None => break,
                    }
                }
                let k = self.nodes.insert(Node::new(key, value, hash));
                self.nodes[last].next = Some(k);
                if count + 1 >= TREEIFY_THRESHOLD {
                    self.treeify_bin(i);
                }
                k
            }
            Bin::Tree { root, first } => {
                if let Some(found) = tree_bin::find(&self.nodes, &self.tie, root, hash, &key) {
                    return Placement::Occupied(found, value);
                }
                let k = self.nodes.insert(Node::new(key, value, hash));
                let root = tree_bin::insert(&mut self.nodes, &self.tie, root, k);
                self.bins[i] = Bin::Tree { root, first };
                k
            }
        };
        self.mod_count += 1;
        if self.nodes.len() > self.threshold {
            self.resize();
        }
        Placement::Vacant(k)
    }

    /// Convert bin `i` to a tree, or grow the table instead while it is
    /// still smaller than `MIN_TREEIFY_CAPACITY`.
    fn treeify_bin(&mut self, i: usize) {
        if self.bins.len() < MIN_TREEIFY_CAPACITY {
            self.resize();
            return;
        }
        if let Bin::Chain(first) = self.bins[i] {
            let root = tree_bin::treeify(&mut self.nodes, &self.tie, first);
            debug!("treeified bin {} of {}", i, self.bins.len());
            self.bins[i] = Bin::Tree { root, first };
        }
    }

    /// Allocate the table, or double it. Each old bin splits on the hash
    /// bit `old_cap`: entries without it keep their index, the rest move up
    /// by `old_cap`. Relative order within a bin is preserved and no hash is
    /// recomputed.
    pub(crate) fn resize(&mut self) {
        let old_cap = self.bins.len();
        let (new_cap, new_thr) = if old_cap > 0 {
            if old_cap >= MAXIMUM_CAPACITY {
                self.threshold = usize::MAX;
                return;
            }
            let new_cap = old_cap << 1;
            let new_thr = if new_cap < MAXIMUM_CAPACITY && old_cap >= DEFAULT_INITIAL_CAPACITY {
                self.threshold.saturating_mul(2)
            } else {
                threshold_for(new_cap, self.load_factor)
            };
            (new_cap, new_thr)
        } else if self.threshold > 0 {
            (self.threshold, threshold_for(self.threshold, self.load_factor))
        } else {
            (
                DEFAULT_INITIAL_CAPACITY,
                threshold_for(DEFAULT_INITIAL_CAPACITY, self.load_factor),
            )
        };
        self.threshold = new_thr;
        let old = core::mem::replace(&mut self.bins, vec![Bin::Empty; new_cap]);
        if old_cap == 0 {
            debug!("allocated bin table of {}", new_cap);
            return;
        }
        for (j, bin) in old.into_iter().enumerate() {
            match bin {
                Bin::Empty => {}
                Bin::Chain(head) => self.split_chain(head, j, old_cap),
                Bin::Tree { root, first } => tree_bin::split(
                    &mut self.nodes,
                    &self.tie,
                    &mut self.bins,
                    j,
                    old_cap,
                    root,
                    first,
                ),
            }
        }
        debug!(
            "resized bin table {} -> {} ({} entries)",
            old_cap,
            new_cap,
            self.nodes.len()
        );
    }

    fn split_chain(&mut self, head: DefaultKey, j: usize, old_cap: usize) {
        let mut lo = ChainBuilder::default();
        let mut hi = ChainBuilder::default();
        let mut cur = Some(head);
        while let Some(k) = cur {
            cur = self.nodes[k].next;
            if (self.nodes[k].hash & old_cap as u64) == 0 {
                lo.push(&mut self.nodes, k);
            } else {
                hi.push(&mut self.nodes, k);
            }
        }
        trace!("split bin {}: {} stay, {} move", j, lo.len, hi.len);
        if let Some(h) = lo.finish(&mut self.nodes) {
            self.bins[j] = Bin::Chain(h);
        }
        if let Some(h) = hi.finish(&mut self.nodes) {
            self.bins[j + old_cap] = Bin::Chain(h);
        }
    }

    /// Pre-size for `additional` more entries.
    pub(crate) fn reserve(&mut self, additional: usize) {
        let wanted = self.nodes.len().saturating_add(additional);
        if wanted == 0 {
            return;
        }
        if self.bins.is_empty() {
            let ft = wanted as f64 / f64::from(self.load_factor) + 1.0;
            let t = if ft < MAXIMUM_CAPACITY as f64 {
                ft as usize
            } else {
                MAXIMUM_CAPACITY
            };
            if t > self.threshold {
                self.threshold = table_size_for(t);
            }
        } else {
            while wanted > self.threshold && self.bins.len() < MAXIMUM_CAPACITY {
                self.resize();
            }
        }
    }

    /// Panics if any structural invariant is broken.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        if self.bins.is_empty() {
            assert!(self.nodes.is_empty(), "entries without a table");
            return;
        }
        assert!(self.bins.len().is_power_of_two());
        let mut seen = 0;
        for (i, bin) in self.bins.iter().enumerate() {
            let mut in_bin = 0;
            let mut prev = None;
            let mut cur = bin.first();
            while let Some(k) = cur {
                let n = &self.nodes[k];
                assert_eq!(
                    bin_index(n.hash, self.bins.len()),
                    i,
                    "entry stored in the wrong bin"
                );
                if let Bin::Tree { .. } = bin {
                    assert_eq!(n.tree.prev, prev, "broken prev link in tree bin {i}");
                }
                in_bin += 1;
                prev = cur;
                cur = n.next;
            }
            if let Bin::Tree { root, .. } = *bin {
                let in_tree = tree_bin::assert_tree(&self.nodes, &self.tie, root);
                assert_eq!(in_tree, in_bin, "tree and chain of bin {i} disagree");
            }
            seen += in_bin;
        }
        assert_eq!(seen, self.nodes.len(), "size counter out of sync with bins");
    }
}

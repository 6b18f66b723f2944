//! Red-black tree bins.
//!
//! A bin whose chain grows to `TREEIFY_THRESHOLD` entries is rebuilt as a
//! red-black tree over the same arena nodes, so lookups inside a heavily
//! colliding bin stay logarithmic.
//!
//! Ordering: by cached hash, then by the map's `TieBreak`, then by arena
//! key. A lookup that meets an equal hash the tie-break cannot order
//! searches both subtrees. The arena key is stable for the life of an
//! entry, which gives every pair of nodes a fixed total order for
//! balancing.
//!
//! The bin chain (`next` plus `TreeLinks::prev`) is maintained next to the
//! tree links; splitting and untreeifying walk the chain, never the tree.

use crate::hashing::UNTREEIFY_THRESHOLD;
use crate::table::{keys_match, Bin, ChainBuilder, Nodes, TreeLinks};
use crate::tie_break::TieBreak;
use core::borrow::Borrow;
use core::cmp::Ordering;
use log::debug;
use slotmap::DefaultKey;

#[inline]
fn parent<K, V>(nodes: &Nodes<K, V>, k: DefaultKey) -> Option<DefaultKey> {
    nodes[k].tree.parent
}

#[inline]
fn left<K, V>(nodes: &Nodes<K, V>, k: DefaultKey) -> Option<DefaultKey> {
    nodes[k].tree.left
}

#[inline]
fn right<K, V>(nodes: &Nodes<K, V>, k: DefaultKey) -> Option<DefaultKey> {
    nodes[k].tree.right
}

/// Missing children count as black.
#[inline]
fn is_red<K, V>(nodes: &Nodes<K, V>, k: Option<DefaultKey>) -> bool {
    k.is_some_and(|k| nodes[k].tree.red)
}

#[inline]
fn set_red<K, V>(nodes: &mut Nodes<K, V>, k: DefaultKey, red: bool) {
    nodes[k].tree.red = red;
}

/// Point `p`'s parent at `new` where it used to point at `old`.
fn replace_child<K, V>(
    nodes: &mut Nodes<K, V>,
    p: Option<DefaultKey>,
    old: DefaultKey,
    new: Option<DefaultKey>,
) {
    if let Some(p) = p {
        if left(nodes, p) == Some(old) {
            nodes[p].tree.left = new;
        } else if right(nodes, p) == Some(old) {
            nodes[p].tree.right = new;
        }
    }
}

/// Total order used for placement.
#[inline]
fn precedes<K, V, T: TieBreak<K>>(
    nodes: &Nodes<K, V>,
    tie: &T,
    a: DefaultKey,
    b: DefaultKey,
) -> bool {
    let (na, nb) = (&nodes[a], &nodes[b]);
    match na.hash.cmp(&nb.hash) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => match tie.compare(&na.key, &nb.key) {
            Some(Ordering::Less) => true,
            Some(Ordering::Greater) => false,
            _ => a < b,
        },
    }
}

pub(crate) fn find<K, V, Q, T>(
    nodes: &Nodes<K, V>,
    tie: &T,
    root: DefaultKey,
    hash: u64,
    q: &Q,
) -> Option<DefaultKey>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
    T: TieBreak<Q>,
{
    let mut p = Some(root);
    while let Some(k) = p {
        let n = &nodes[k];
        if n.hash > hash {
            p = n.tree.left;
        } else if n.hash < hash {
            p = n.tree.right;
        } else if keys_match(&n.key, q) {
            return Some(k);
        } else {
            let nk: &Q = n.key.borrow();
            match tie.compare(nk, q) {
                Some(Ordering::Greater) => p = n.tree.left,
                Some(Ordering::Less) => p = n.tree.right,
                _ => match (n.tree.left, n.tree.right) {
                    (None, r) => p = r,
                    (l, None) => p = l,
                    (l, Some(r)) => {
                        if let Some(found) = find(nodes, tie, r, hash, q) {
                            return Some(found);
                        }
                        p = l;
                    }
                },
            }
        }
    }
    None
}

/// Attach `x` as a leaf; returns its parent. Does not rebalance.
fn attach<K, V, T: TieBreak<K>>(
    nodes: &mut Nodes<K, V>,
    tie: &T,
    root: DefaultKey,
    x: DefaultKey,
) -> DefaultKey {
    let mut p = root;
    loop {
        let go_left = precedes(nodes, tie, x, p);
        let child = if go_left { left(nodes, p) } else { right(nodes, p) };
        match child {
            Some(c) => p = c,
            None => {
                if go_left {
                    nodes[p].tree.left = Some(x);
                } else {
                    nodes[p].tree.right = Some(x);
                }
                nodes[x].tree.parent = Some(p);
                return p;
            }
        }
    }
}

/// Insert the fresh node `x` (not yet in any bin) into the tree rooted at
/// `root`, linking it into the bin chain right after its tree parent.
/// Returns the new root.
pub(crate) fn insert<K, V, T: TieBreak<K>>(
    nodes: &mut Nodes<K, V>,
    tie: &T,
    root: DefaultKey,
    x: DefaultKey,
) -> DefaultKey {
    let xp = attach(nodes, tie, root, x);
    let after = nodes[xp].next;
    nodes[x].next = after;
    nodes[x].tree.prev = Some(xp);
    nodes[xp].next = Some(x);
    if let Some(after) = after {
        nodes[after].tree.prev = Some(x);
    }
    balance_insertion(nodes, root, x)
}

/// Build a tree from the chain starting at `first`, keeping chain order.
/// Returns the root.
pub(crate) fn treeify<K, V, T: TieBreak<K>>(
    nodes: &mut Nodes<K, V>,
    tie: &T,
    first: DefaultKey,
) -> DefaultKey {
    nodes[first].tree = TreeLinks::default();
    let mut root = first;
    let mut prev = first;
    let mut cur = nodes[first].next;
    while let Some(x) = cur {
        cur = nodes[x].next;
        nodes[x].tree = TreeLinks {
            prev: Some(prev),
            ..TreeLinks::default()
        };
        attach(nodes, tie, root, x);
        root = balance_insertion(nodes, root, x);
        prev = x;
    }
    root
}

/// Clear tree links along the chain starting at `first`.
pub(crate) fn untreeify<K, V>(nodes: &mut Nodes<K, V>, first: DefaultKey) -> Bin {
    let mut cur = Some(first);
    let mut n = 0;
    while let Some(k) = cur {
        nodes[k].tree = TreeLinks::default();
        cur = nodes[k].next;
        n += 1;
    }
    debug!("untreeified bin with {} entries", n);
    Bin::Chain(first)
}

/// Unlink `p` from the tree bin `(root, first)` and return what the bin
/// becomes. The node itself stays in the arena; the caller frees it.
pub(crate) fn remove<K, V>(
    nodes: &mut Nodes<K, V>,
    root: DefaultKey,
    first: DefaultKey,
    p: DefaultKey,
) -> Bin {
    let succ = nodes[p].next;
    let pred = nodes[p].tree.prev;
    let first = match pred {
        None => succ,
        Some(pred) => {
            nodes[pred].next = succ;
            Some(first)
        }
    };
    if let Some(succ) = succ {
        nodes[succ].tree.prev = pred;
    }
    let Some(first) = first else {
        return Bin::Empty;
    };
    // Small trees fall back to a chain instead of rebalancing.
    let too_small = match (left(nodes, root), right(nodes, root)) {
        (Some(rl), Some(_)) => left(nodes, rl).is_none(),
        _ => true,
    };
    if too_small {
        return untreeify(nodes, first);
    }

    let mut root = root;
    let replacement = match (left(nodes, p), right(nodes, p)) {
        (Some(pl), Some(pr)) => {
            // Swap p with its in-order successor s by relinking, so arena
            // keys held elsewhere stay attached to their entries.
            let mut s = pr;
            while let Some(sl) = left(nodes, s) {
                s = sl;
            }
            let (s_red, p_red) = (nodes[s].tree.red, nodes[p].tree.red);
            set_red(nodes, s, p_red);
            set_red(nodes, p, s_red);
            let sr = right(nodes, s);
            let pp = parent(nodes, p);
            if s == pr {
                nodes[p].tree.parent = Some(s);
                nodes[s].tree.right = Some(p);
            } else {
                let sp = parent(nodes, s);
                nodes[p].tree.parent = sp;
                replace_child(nodes, sp, s, Some(p));
                nodes[s].tree.right = Some(pr);
                nodes[pr].tree.parent = Some(s);
            }
            nodes[p].tree.left = None;
            nodes[p].tree.right = sr;
            if let Some(sr) = sr {
                nodes[sr].tree.parent = Some(p);
            }
            nodes[s].tree.left = Some(pl);
            nodes[pl].tree.parent = Some(s);
            nodes[s].tree.parent = pp;
            match pp {
                None => root = s,
                Some(_) => replace_child(nodes, pp, p, Some(s)),
            }
            sr.unwrap_or(p)
        }
        (Some(pl), None) => pl,
        (None, Some(pr)) => pr,
        (None, None) => p,
    };

    if replacement != p {
        let pp = parent(nodes, p);
        nodes[replacement].tree.parent = pp;
        match pp {
            None => {
                root = replacement;
                set_red(nodes, replacement, false);
            }
            Some(_) => replace_child(nodes, pp, p, Some(replacement)),
        }
        nodes[p].tree.left = None;
        nodes[p].tree.right = None;
        nodes[p].tree.parent = None;
    }

    if !nodes[p].tree.red {
        root = balance_deletion(nodes, root, replacement);
    }

    if replacement == p {
        let pp = nodes[p].tree.parent.take();
        replace_child(nodes, pp, p, None);
    }
    Bin::Tree { root, first }
}

/// Split a tree bin during a resize from `old_cap` to `2 * old_cap`.
/// Halves at or below `UNTREEIFY_THRESHOLD` become chains; a half that kept
/// every node keeps the existing tree.
pub(crate) fn split<K, V, T: TieBreak<K>>(
    nodes: &mut Nodes<K, V>,
    tie: &T,
    bins: &mut [Bin],
    j: usize,
    old_cap: usize,
    root: DefaultKey,
    first: DefaultKey,
) {
    let mut lo = ChainBuilder::default();
    let mut hi = ChainBuilder::default();
    let mut cur = Some(first);
    while let Some(k) = cur {
        cur = nodes[k].next;
        if (nodes[k].hash & old_cap as u64) == 0 {
            lo.push(nodes, k);
        } else {
            hi.push(nodes, k);
        }
    }
    let (lo_whole, hi_whole) = (hi.is_empty(), lo.is_empty());
    bins[j] = settle(nodes, tie, &lo, lo_whole, root);
    bins[j + old_cap] = settle(nodes, tie, &hi, hi_whole, root);
}

fn settle<K, V, T: TieBreak<K>>(
    nodes: &mut Nodes<K, V>,
    tie: &T,
    half: &ChainBuilder,
    whole: bool,
    root: DefaultKey,
) -> Bin {
    let Some(first) = half.finish(nodes) else {
        return Bin::Empty;
    };
    if half.len <= UNTREEIFY_THRESHOLD {
        untreeify(nodes, first)
    } else if whole {
        Bin::Tree { root, first }
    } else {
        Bin::Tree {
            root: treeify(nodes, tie, first),
            first,
        }
    }
}

fn rotate_left<K, V>(nodes: &mut Nodes<K, V>, mut root: DefaultKey, p: DefaultKey) -> DefaultKey {
    let Some(r) = right(nodes, p) else {
        return root;
    };
    let rl = left(nodes, r);
    nodes[p].tree.right = rl;
    if let Some(rl) = rl {
        nodes[rl].tree.parent = Some(p);
    }
    let pp = parent(nodes, p);
    nodes[r].tree.parent = pp;
    match pp {
        None => {
            root = r;
            set_red(nodes, r, false);
        }
        Some(_) => replace_child(nodes, pp, p, Some(r)),
    }
    nodes[r].tree.left = Some(p);
    nodes[p].tree.parent = Some(r);
    root
}

fn rotate_right<K, V>(nodes: &mut Nodes<K, V>, mut root: DefaultKey, p: DefaultKey) -> DefaultKey {
    let Some(l) = left(nodes, p) else {
        return root;
    };
    let lr = right(nodes, l);
    nodes[p].tree.left = lr;
    if let Some(lr) = lr {
        nodes[lr].tree.parent = Some(p);
    }
    let pp = parent(nodes, p);
    nodes[l].tree.parent = pp;
    match pp {
        None => {
            root = l;
            set_red(nodes, l, false);
        }
        Some(_) => replace_child(nodes, pp, p, Some(l)),
    }
    nodes[l].tree.right = Some(p);
    nodes[p].tree.parent = Some(l);
    root
}

fn balance_insertion<K, V>(
    nodes: &mut Nodes<K, V>,
    mut root: DefaultKey,
    mut x: DefaultKey,
) -> DefaultKey {
    set_red(nodes, x, true);
    loop {
        let Some(xp) = parent(nodes, x) else {
            set_red(nodes, x, false);
            return x;
        };
        if !nodes[xp].tree.red {
            return root;
        }
        let Some(xpp) = parent(nodes, xp) else {
            return root;
        };
        let xppl = left(nodes, xpp);
        if xppl == Some(xp) {
            let uncle = right(nodes, xpp);
            if let Some(u) = uncle.filter(|&u| nodes[u].tree.red) {
                set_red(nodes, u, false);
                set_red(nodes, xp, false);
                set_red(nodes, xpp, true);
                x = xpp;
            } else {
                // Inner child: rotate it to the outside first.
                let (x2, xp2) = if right(nodes, xp) == Some(x) {
                    root = rotate_left(nodes, root, xp);
                    (xp, x)
                } else {
                    (x, xp)
                };
                set_red(nodes, xp2, false);
                set_red(nodes, xpp, true);
                root = rotate_right(nodes, root, xpp);
                x = x2;
            }
        } else if let Some(u) = xppl.filter(|&u| nodes[u].tree.red) {
            set_red(nodes, u, false);
            set_red(nodes, xp, false);
            set_red(nodes, xpp, true);
            x = xpp;
        } else {
            let (x2, xp2) = if left(nodes, xp) == Some(x) {
                root = rotate_right(nodes, root, xp);
                (xp, x)
            } else {
                (x, xp)
            };
            set_red(nodes, xp2, false);
            set_red(nodes, xpp, true);
            root = rotate_left(nodes, root, xpp);
            x = x2;
        }
    }
}

fn balance_deletion<K, V>(
    nodes: &mut Nodes<K, V>,
    mut root: DefaultKey,
    mut x: DefaultKey,
) -> DefaultKey {
    loop {
        if x == root {
            return root;
        }
        let Some(xp) = parent(nodes, x) else {
            set_red(nodes, x, false);
            return x;
        };
        if nodes[x].tree.red {
            set_red(nodes, x, false);
            return root;
        }
        if left(nodes, xp) == Some(x) {
            let mut sib = right(nodes, xp);
            if let Some(s) = sib.filter(|&s| nodes[s].tree.red) {
                set_red(nodes, s, false);
                set_red(nodes, xp, true);
                root = rotate_left(nodes, root, xp);
                sib = right(nodes, xp);
            }
            let Some(s) = sib else {
                x = xp;
                continue;
            };
            let (sl, sr) = (left(nodes, s), right(nodes, s));
            if !is_red(nodes, sl) && !is_red(nodes, sr) {
                set_red(nodes, s, true);
                x = xp;
                continue;
            }
            let sib = if !is_red(nodes, sr) {
                if let Some(sl) = sl {
                    set_red(nodes, sl, false);
                }
                set_red(nodes, s, true);
                root = rotate_right(nodes, root, s);
                right(nodes, xp)
            } else {
                Some(s)
            };
            if let Some(s) = sib {
                let xp_red = nodes[xp].tree.red;
                set_red(nodes, s, xp_red);
                if let Some(sr) = right(nodes, s) {
                    set_red(nodes, sr, false);
                }
            }
            set_red(nodes, xp, false);
            root = rotate_left(nodes, root, xp);
            x = root;
        } else {
            let mut sib = left(nodes, xp);
            if let Some(s) = sib.filter(|&s| nodes[s].tree.red) {
                set_red(nodes, s, false);
                set_red(nodes, xp, true);
                root = rotate_right(nodes, root, xp);
                sib = left(nodes, xp);
            }
            let Some(s) = sib else {
                x = xp;
                continue;
            };
            let (sl, sr) = (left(nodes, s), right(nodes, s));
            if !is_red(nodes, sl) && !is_red(nodes, sr) {
                set_red(nodes, s, true);
                x = xp;
                continue;
            }
            let sib = if !is_red(nodes, sl) {
                if let Some(sr) = sr {
                    set_red(nodes, sr, false);
                }
                set_red(nodes, s, true);
                root = rotate_left(nodes, root, s);
                left(nodes, xp)
            } else {
                Some(s)
            };
            if let Some(s) = sib {
                let xp_red = nodes[xp].tree.red;
                set_red(nodes, s, xp_red);
                if let Some(sl) = left(nodes, s) {
                    set_red(nodes, sl, false);
                }
            }
            set_red(nodes, xp, false);
            root = rotate_right(nodes, root, xp);
            x = root;
        }
    }
}

/// Checks the red-black and search-order properties of the tree at `root`
/// and returns its node count.
#[cfg(test)]
pub(crate) fn assert_tree<K, V, T: TieBreak<K>>(
    nodes: &Nodes<K, V>,
    tie: &T,
    root: DefaultKey,
) -> usize {
    fn walk<K, V, T: TieBreak<K>>(
        nodes: &Nodes<K, V>,
        tie: &T,
        k: DefaultKey,
        lo: Option<DefaultKey>,
        hi: Option<DefaultKey>,
    ) -> (usize, usize) {
        let t = nodes[k].tree;
        if let Some(lo) = lo {
            assert!(precedes(nodes, tie, lo, k), "search order violated");
        }
        if let Some(hi) = hi {
            assert!(precedes(nodes, tie, k, hi), "search order violated");
        }
        let side = |c: Option<DefaultKey>, lo, hi| match c {
            None => (0, 1),
            Some(c) => {
                assert_eq!(nodes[c].tree.parent, Some(k), "broken parent link");
                assert!(!(t.red && nodes[c].tree.red), "red node with red child");
                walk(nodes, tie, c, lo, hi)
            }
        };
        let (lc, lb) = side(t.left, lo, Some(k));
        let (rc, rb) = side(t.right, Some(k), hi);
        assert_eq!(lb, rb, "unequal black height");
        (1 + lc + rc, lb + usize::from(!t.red))
    }
    assert!(nodes[root].tree.parent.is_none(), "root has a parent");
    assert!(!nodes[root].tree.red, "root is red");
    walk(nodes, tie, root, None, None).0
}

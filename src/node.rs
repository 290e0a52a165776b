//! Trie nodes of the compressed hash-array mapped prefix tree (CHAMP).
//!
//! A trie level consumes [`BIT_PARTITION_SIZE`] bits of the 64-bit key hash,
//! least significant bits first. Branch nodes keep two disjoint bitmaps: one
//! for entries stored inline and one for sub-nodes. Keys whose full hashes
//! are equal end up in a [`Collision`] node below the last branch level.
//!
//! Canonical form, maintained eagerly by [`Node::remove`]:
//! - a non-root branch always holds at least two entries or one sub-node;
//! - a collision node always holds at least two entries;
//! - `popcount(data_map) == entries.len()` and `popcount(node_map) == children.len()`.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

// =============================================================================
// Configuration
// =============================================================================

/// Hash bits consumed per trie level (32-way branching).
pub(crate) const BIT_PARTITION_SIZE: u32 = 5;
const BIT_PARTITION_MASK: u64 = (1 << BIT_PARTITION_SIZE) - 1;
/// Width of the key hash.
pub(crate) const HASH_BITS: u32 = 64;
/// Number of branch levels (shifts 0, 5, ..., 60).
pub(crate) const MAX_DEPTH: usize = HASH_BITS.div_ceil(BIT_PARTITION_SIZE) as usize;

// =============================================================================
// Bit utilities
// =============================================================================

#[inline]
fn fragment(hash: u64, shift: u32) -> u32 {
    debug_assert!(shift < HASH_BITS);
    ((hash >> shift) & BIT_PARTITION_MASK) as u32
}

#[inline]
fn bitpos(fragment: u32) -> u32 {
    1 << fragment
}

/// Position of `bit` in the compacted array described by `bitmap`.
#[inline]
fn index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// =============================================================================
// Owner tokens
// =============================================================================

/// Generation id of a builder.
///
/// A node stamped with `Some(owner)` was created by that builder generation
/// and is mutated in place by it. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Owner(u64);

impl Owner {
    pub(crate) fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Owner(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Node types
// =============================================================================

/// A stored payload together with its cached key hash.
#[derive(Clone, Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
}

#[derive(Clone)]
pub(crate) struct Branch<K, V> {
    owner: Option<Owner>,
    data_map: u32,
    node_map: u32,
    entries: Vec<Entry<K, V>>,
    children: Vec<Arc<Node<K, V>>>,
}

#[derive(Clone)]
pub(crate) struct Collision<K, V> {
    owner: Option<Owner>,
    hash: u64,
    entries: SmallVec<[Entry<K, V>; 2]>,
}

#[derive(Clone)]
pub(crate) enum Node<K, V> {
    Branch(Branch<K, V>),
    Collision(Collision<K, V>),
}

/// What an [`Node::update`] or [`Node::remove`] call did.
pub(crate) struct Change<V> {
    /// Whether any node content changed.
    pub(crate) modified: bool,
    /// Replaced value (update) or removed value (remove).
    pub(crate) old: Option<V>,
}

impl<V> Change<V> {
    pub(crate) fn new() -> Self {
        Change {
            modified: false,
            old: None,
        }
    }

    /// A new key was added by an update.
    pub(crate) fn added(&self) -> bool {
        self.modified && self.old.is_none()
    }
}

impl<K, V> Node<K, V> {
    pub(crate) fn empty() -> Self {
        Node::Branch(Branch {
            owner: None,
            data_map: 0,
            node_map: 0,
            entries: Vec::new(),
            children: Vec::new(),
        })
    }

    #[inline]
    fn owner(&self) -> Option<Owner> {
        match self {
            Node::Branch(branch) => branch.owner,
            Node::Collision(collision) => collision.owner,
        }
    }

    #[inline]
    fn set_owner(&mut self, owner: Option<Owner>) {
        match self {
            Node::Branch(branch) => branch.owner = owner,
            Node::Collision(collision) => collision.owner = owner,
        }
    }

    /// Entries stored inline in this node.
    #[inline]
    pub(crate) fn entries(&self) -> &[Entry<K, V>] {
        match self {
            Node::Branch(branch) => &branch.entries,
            Node::Collision(collision) => &collision.entries,
        }
    }

    /// Sub-nodes of this node (always empty for collision nodes).
    #[inline]
    pub(crate) fn children(&self) -> &[Arc<Node<K, V>>] {
        match self {
            Node::Branch(branch) => &branch.children,
            Node::Collision(_) => &[],
        }
    }

    #[inline]
    fn is_singleton(&self) -> bool {
        self.children().is_empty() && self.entries().len() == 1
    }

    fn as_branch_mut(&mut self) -> &mut Branch<K, V> {
        match self {
            Node::Branch(branch) => branch,
            Node::Collision(_) => unreachable!("editing preserves the node variant"),
        }
    }

    fn as_collision_mut(&mut self) -> &mut Collision<K, V> {
        match self {
            Node::Collision(collision) => collision,
            Node::Branch(_) => unreachable!("editing preserves the node variant"),
        }
    }

    /// Looks up `key` below this node, which must sit at shift `0`.
    pub(crate) fn find<Q>(&self, key: &Q, hash: u64) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = 0;
        loop {
            match node {
                Node::Branch(branch) => {
                    let bit = bitpos(fragment(hash, shift));
                    if branch.data_map & bit != 0 {
                        let entry = &branch.entries[index(branch.data_map, bit)];
                        return (entry.hash == hash && entry.key.borrow() == key).then_some(entry);
                    }
                    if branch.node_map & bit == 0 {
                        return None;
                    }
                    node = &branch.children[index(branch.node_map, bit)];
                    shift += BIT_PARTITION_SIZE;
                }
                Node::Collision(collision) => {
                    if collision.hash != hash {
                        return None;
                    }
                    return collision.entries.iter().find(|e| e.key.borrow() == key);
                }
            }
        }
    }

    /// Builds the smallest subtree at `shift` that holds both entries.
    fn merge_two(owner: Option<Owner>, e0: Entry<K, V>, e1: Entry<K, V>, shift: u32) -> Self {
        if shift >= HASH_BITS {
            debug_assert_eq!(e0.hash, e1.hash);
            log::trace!("full hash collision at {:#018x}", e0.hash);
            return Node::Collision(Collision {
                owner,
                hash: e0.hash,
                entries: smallvec![e0, e1],
            });
        }

        let f0 = fragment(e0.hash, shift);
        let f1 = fragment(e1.hash, shift);
        if f0 != f1 {
            let entries = if f0 < f1 { vec![e0, e1] } else { vec![e1, e0] };
            return Node::Branch(Branch {
                owner,
                data_map: bitpos(f0) | bitpos(f1),
                node_map: 0,
                entries,
                children: Vec::new(),
            });
        }

        let child = Self::merge_two(owner, e0, e1, shift + BIT_PARTITION_SIZE);
        Node::Branch(Branch {
            owner,
            data_map: 0,
            node_map: bitpos(f0),
            entries: Vec::new(),
            children: vec![Arc::new(child)],
        })
    }

    /// A single-entry branch laid out as if it sat at shift `0`.
    fn singleton(owner: Option<Owner>, entry: Entry<K, V>) -> Self {
        Node::Branch(Branch {
            owner,
            data_map: bitpos(fragment(entry.hash, 0)),
            node_map: 0,
            entries: vec![entry],
            children: Vec::new(),
        })
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    #[inline]
    fn owned_by(this: &Arc<Self>, owner: Option<Owner>) -> bool {
        owner.is_some() && this.owner() == owner
    }

    /// Returns a mutable view of `this`, copying it first unless it belongs
    /// to `owner`. `Arc::make_mut` still copies a shared node.
    fn edit(this: &mut Arc<Self>, owner: Option<Owner>) -> &mut Self {
        if !Self::owned_by(this, owner) {
            let mut copy = (**this).clone();
            copy.set_owner(owner);
            *this = Arc::new(copy);
        }
        Arc::make_mut(this)
    }

    fn into_single_entry(node: Arc<Self>) -> Entry<K, V> {
        debug_assert!(node.is_singleton());
        match Arc::try_unwrap(node) {
            Ok(Node::Branch(mut branch)) => branch.entries.swap_remove(0),
            Ok(Node::Collision(mut collision)) => collision.entries.swap_remove(0),
            Err(shared) => shared.entries()[0].clone(),
        }
    }

    /// Inserts `entry` or, when its key is present, replaces the stored value
    /// with `merge(old, new)` unless `merge` returns `None`.
    ///
    /// Nodes the caller does not own are only copied once a change is certain.
    pub(crate) fn update<F>(
        this: &mut Arc<Self>,
        owner: Option<Owner>,
        entry: Entry<K, V>,
        shift: u32,
        merge: &F,
        change: &mut Change<V>,
    ) where
        K: Eq,
        F: Fn(&V, V) -> Option<V>,
    {
        match &**this {
            Node::Branch(branch) => {
                let bit = bitpos(fragment(entry.hash, shift));
                if branch.data_map & bit != 0 {
                    let idx = index(branch.data_map, bit);
                    let current = &branch.entries[idx];
                    if current.hash == entry.hash && current.key == entry.key {
                        let Some(value) = merge(&current.value, entry.value) else {
                            return;
                        };
                        let branch = Self::edit(this, owner).as_branch_mut();
                        change.old = Some(std::mem::replace(&mut branch.entries[idx].value, value));
                        change.modified = true;
                        return;
                    }

                    let branch = Self::edit(this, owner).as_branch_mut();
                    let existing = branch.entries.remove(idx);
                    branch.data_map ^= bit;
                    let child = Self::merge_two(owner, existing, entry, shift + BIT_PARTITION_SIZE);
                    branch.node_map |= bit;
                    branch.children.insert(index(branch.node_map, bit), Arc::new(child));
                    change.modified = true;
                } else if branch.node_map & bit != 0 {
                    let idx = index(branch.node_map, bit);
                    let next_shift = shift + BIT_PARTITION_SIZE;
                    if Self::owned_by(this, owner) {
                        let branch = Self::edit(this, owner).as_branch_mut();
                        let child = &mut branch.children[idx];
                        Self::update(child, owner, entry, next_shift, merge, change);
                        return;
                    }

                    let mut child = Arc::clone(&branch.children[idx]);
                    Self::update(&mut child, owner, entry, next_shift, merge, change);
                    if change.modified {
                        Self::edit(this, owner).as_branch_mut().children[idx] = child;
                    }
                } else {
                    let branch = Self::edit(this, owner).as_branch_mut();
                    branch.data_map |= bit;
                    branch.entries.insert(index(branch.data_map, bit), entry);
                    change.modified = true;
                }
            }
            Node::Collision(collision) => {
                debug_assert_eq!(collision.hash, entry.hash);
                match collision.entries.iter().position(|e| e.key == entry.key) {
                    Some(idx) => {
                        let Some(value) = merge(&collision.entries[idx].value, entry.value) else {
                            return;
                        };
                        let collision = Self::edit(this, owner).as_collision_mut();
                        change.old =
                            Some(std::mem::replace(&mut collision.entries[idx].value, value));
                    }
                    None => {
                        Self::edit(this, owner).as_collision_mut().entries.push(entry);
                    }
                }
                change.modified = true;
            }
        }
    }

    /// Removes `key`, compacting the path so the trie stays canonical.
    pub(crate) fn remove<Q>(
        this: &mut Arc<Self>,
        owner: Option<Owner>,
        key: &Q,
        hash: u64,
        shift: u32,
        change: &mut Change<V>,
    ) where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match &**this {
            Node::Branch(branch) => {
                let bit = bitpos(fragment(hash, shift));
                if branch.data_map & bit != 0 {
                    let idx = index(branch.data_map, bit);
                    let current = &branch.entries[idx];
                    if current.hash != hash || current.key.borrow() != key {
                        return;
                    }

                    let branch = Self::edit(this, owner).as_branch_mut();
                    let removed = branch.entries.remove(idx);
                    if shift > 0 && branch.children.is_empty() && branch.entries.len() == 1 {
                        // The parent inlines the survivor; until then it uses the root layout.
                        branch.data_map = bitpos(fragment(branch.entries[0].hash, 0));
                    } else {
                        branch.data_map ^= bit;
                    }
                    change.old = Some(removed.value);
                    change.modified = true;
                } else if branch.node_map & bit != 0 {
                    let idx = index(branch.node_map, bit);
                    let next_shift = shift + BIT_PARTITION_SIZE;
                    if Self::owned_by(this, owner) {
                        let branch = Self::edit(this, owner).as_branch_mut();
                        let mut child = branch.children.remove(idx);
                        branch.node_map ^= bit;
                        Self::remove(&mut child, owner, key, hash, next_shift, change);
                        Self::reattach(this, bit, child);
                        return;
                    }

                    let mut child = Arc::clone(&branch.children[idx]);
                    Self::remove(&mut child, owner, key, hash, next_shift, change);
                    if !change.modified {
                        return;
                    }
                    let branch = Self::edit(this, owner).as_branch_mut();
                    branch.children.remove(idx);
                    branch.node_map ^= bit;
                    Self::reattach(this, bit, child);
                }
            }
            Node::Collision(collision) => {
                if collision.hash != hash {
                    return;
                }
                let Some(idx) = collision.entries.iter().position(|e| e.key.borrow() == key) else {
                    return;
                };

                let collision = Self::edit(this, owner).as_collision_mut();
                let removed = collision.entries.remove(idx);
                change.old = Some(removed.value);
                change.modified = true;
                if collision.entries.len() == 1 {
                    let survivor = collision.entries.remove(0);
                    *this = Arc::new(Self::singleton(owner, survivor));
                }
            }
        }
    }

    /// Puts a detached sub-node back under `bit` of the already edited
    /// branch `this`, inlining or escalating it when it is a singleton.
    fn reattach(this: &mut Arc<Self>, bit: u32, child: Arc<Self>) {
        let branch = Arc::make_mut(this).as_branch_mut();
        if !child.is_singleton() {
            branch.node_map |= bit;
            branch.children.insert(index(branch.node_map, bit), child);
            return;
        }

        if branch.entries.is_empty() && branch.children.is_empty() {
            *this = child;
            return;
        }

        let entry = Self::into_single_entry(child);
        branch.data_map |= bit;
        branch.entries.insert(index(branch.data_map, bit), entry);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Branch(branch) => f
                .debug_struct("Branch")
                .field("data_map", &format_args!("{:#034b}", branch.data_map))
                .field("node_map", &format_args!("{:#034b}", branch.node_map))
                .field("entries", &branch.entries)
                .field("children", &branch.children)
                .finish(),
            Node::Collision(collision) => f
                .debug_struct("Collision")
                .field("hash", &format_args!("{:#018x}", collision.hash))
                .field("entries", &collision.entries)
                .finish(),
        }
    }
}

// =============================================================================
// Borrowing depth-first walk
// =============================================================================

/// Visits every entry below a root: the node's own entries first, then its
/// sub-nodes in bitmap order.
pub(crate) struct EntryIter<'a, K, V> {
    entries: std::slice::Iter<'a, Entry<K, V>>,
    stack: Vec<std::slice::Iter<'a, Arc<Node<K, V>>>>,
}

impl<'a, K, V> EntryIter<'a, K, V> {
    pub(crate) fn new(root: &'a Node<K, V>) -> Self {
        let mut stack = Vec::with_capacity(MAX_DEPTH + 1);
        stack.push(root.children().iter());
        EntryIter {
            entries: root.entries().iter(),
            stack,
        }
    }
}

impl<K, V> Clone for EntryIter<'_, K, V> {
    fn clone(&self) -> Self {
        EntryIter {
            entries: self.entries.clone(),
            stack: self.stack.clone(),
        }
    }
}

impl<'a, K, V> Iterator for EntryIter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.entries.next() {
                return Some(entry);
            }
            let child = loop {
                let top = self.stack.last_mut()?;
                match top.next() {
                    Some(child) => break child,
                    None => {
                        self.stack.pop();
                    }
                }
            };
            self.entries = child.entries().iter();
            self.stack.push(child.children().iter());
        }
    }
}

impl<K, V> std::iter::FusedIterator for EntryIter<'_, K, V> {}

// =============================================================================
// Invariant checks
// =============================================================================

#[cfg(test)]
impl<K, V> Node<K, V> {
    /// Asserts canonical form below `self` and returns the number of entries.
    pub(crate) fn validate(&self, shift: u32, is_root: bool) -> usize {
        match self {
            Node::Branch(branch) => {
                assert!(shift < HASH_BITS, "branch below the last level");
                assert_eq!(branch.data_map & branch.node_map, 0, "bitmaps must be disjoint");
                assert_eq!(branch.data_map.count_ones() as usize, branch.entries.len());
                assert_eq!(branch.node_map.count_ones() as usize, branch.children.len());
                if !is_root {
                    assert!(
                        branch.entries.len() >= 2 || !branch.children.is_empty(),
                        "non-root branch must not be inlinable"
                    );
                }

                let mut bits = branch.data_map;
                for entry in &branch.entries {
                    let bit = bits & bits.wrapping_neg();
                    assert_eq!(bitpos(fragment(entry.hash, shift)), bit, "entry in wrong slot");
                    bits ^= bit;
                }

                let mut count = branch.entries.len();
                let mut bits = branch.node_map;
                for child in &branch.children {
                    let bit = bits & bits.wrapping_neg();
                    for entry in EntryIter::new(child) {
                        assert_eq!(bitpos(fragment(entry.hash, shift)), bit, "child in wrong slot");
                    }
                    bits ^= bit;
                    count += child.validate(shift + BIT_PARTITION_SIZE, false);
                }
                count
            }
            Node::Collision(collision) => {
                assert!(shift >= HASH_BITS, "collision node above the last level");
                assert!(collision.entries.len() >= 2, "collision node must hold two entries");
                for entry in &collision.entries {
                    assert_eq!(entry.hash, collision.hash);
                }
                collision.entries.len()
            }
        }
    }

    /// Number of slots (entries plus sub-nodes).
    pub(crate) fn arity(&self) -> usize {
        self.entries().len() + self.children().len()
    }

    pub(crate) fn is_collision(&self) -> bool {
        matches!(self, Node::Collision(_))
    }

    pub(crate) fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}

//! Owning traversals and fail-fast cursors over trie snapshots.
//!
//! A [`Traversal`] walks an `Arc` snapshot depth-first, entries of a node
//! before its sub-nodes. Because it owns its snapshot it can be split into
//! disjoint halves and moved to other threads. A [`Cursor`] wraps a
//! traversal with an explicit state machine and, when it comes from a
//! [`ChampBuilder`], with a modification check against that builder.

use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::builder::ChampBuilder;
use crate::error::{Error, Result};
use crate::node::{Node, MAX_DEPTH};

/// Pending work in one node: entries `entry_next..entry_end`, then
/// sub-nodes `child_next..child_end`.
struct Frame<K, V> {
    node: Arc<Node<K, V>>,
    entry_next: usize,
    entry_end: usize,
    child_next: usize,
    child_end: usize,
}

impl<K, V> Frame<K, V> {
    fn new(node: Arc<Node<K, V>>) -> Self {
        let entry_end = node.entries().len();
        let child_end = node.children().len();
        Frame {
            node,
            entry_next: 0,
            entry_end,
            child_next: 0,
            child_end,
        }
    }

    #[inline]
    fn pending(&self) -> usize {
        (self.entry_end - self.entry_next) + (self.child_end - self.child_next)
    }

    /// Detaches the last `give` pending slots into a frame of their own.
    fn split_off(&mut self, give: usize) -> Self {
        debug_assert!(give > 0 && give <= self.pending());
        let pending_children = self.child_end - self.child_next;
        let node = Arc::clone(&self.node);
        if give <= pending_children {
            let start = self.child_end - give;
            let frame = Frame {
                node,
                entry_next: self.entry_end,
                entry_end: self.entry_end,
                child_next: start,
                child_end: self.child_end,
            };
            self.child_end = start;
            return frame;
        }

        let start = self.entry_end - (give - pending_children);
        let frame = Frame {
            node,
            entry_next: start,
            entry_end: self.entry_end,
            child_next: self.child_next,
            child_end: self.child_end,
        };
        self.entry_end = start;
        self.child_next = self.child_end;
        frame
    }
}

/// Owning depth-first walk over a trie snapshot.
///
/// Yields cloned `(key, value)` pairs. The size hint is exact until the
/// traversal takes part in a [`split`](Traversal::split).
pub struct Traversal<K, V> {
    stack: Vec<Frame<K, V>>,
    remaining: Option<usize>,
}

impl<K, V> Traversal<K, V> {
    pub(crate) fn new(root: Arc<Node<K, V>>, len: usize) -> Self {
        let mut stack = Vec::with_capacity(MAX_DEPTH + 1);
        stack.push(Frame::new(root));
        Traversal {
            stack,
            remaining: Some(len),
        }
    }

    /// Steps to the next entry and returns the node holding it together
    /// with its index in [`Node::entries`].
    pub(crate) fn advance(&mut self) -> Option<(&Arc<Node<K, V>>, usize)> {
        loop {
            let top = self.stack.last_mut()?;
            if top.entry_next < top.entry_end {
                top.entry_next += 1;
                break;
            }
            if top.child_next < top.child_end {
                let child = Arc::clone(&top.node.children()[top.child_next]);
                top.child_next += 1;
                self.stack.push(Frame::new(child));
            } else {
                self.stack.pop();
            }
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        let top = self.stack.last()?;
        Some((&top.node, top.entry_next - 1))
    }

    /// Exact number of entries left, unknown after a split.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// Hands the second half of the remaining work to a new traversal.
    ///
    /// The work is divided at the shallowest frame with two or more pending
    /// slots. Returns `None` when at most one entry is left.
    pub fn split(&mut self) -> Option<Self> {
        loop {
            while self.stack.last().is_some_and(|f| f.pending() == 0) {
                self.stack.pop();
            }
            let top = self.stack.len().checked_sub(1)?;

            let frame = if let Some(i) = self.stack.iter().position(|f| f.pending() >= 2) {
                let give = self.stack[i].pending() / 2;
                Some(self.stack[i].split_off(give))
            } else {
                // Frames below the top can give away their single slot.
                self.stack[..top]
                    .iter()
                    .position(|f| f.pending() == 1)
                    .map(|i| self.stack[i].split_off(1))
            };
            if let Some(frame) = frame {
                self.remaining = None;
                let mut stack = Vec::with_capacity(MAX_DEPTH + 1);
                stack.push(frame);
                return Some(Traversal {
                    stack,
                    remaining: None,
                });
            }

            // Only the top frame has work, and exactly one slot of it.
            let frame = &mut self.stack[top];
            if frame.child_next == frame.child_end {
                return None;
            }
            let child = Arc::clone(&frame.node.children()[frame.child_next]);
            frame.child_next += 1;
            self.stack.push(Frame::new(child));
        }
    }
}

impl<K: Clone, V: Clone> Iterator for Traversal<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, idx) = self.advance()?;
        let entry = &node.entries()[idx];
        Some((entry.key.clone(), entry.value.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (n, Some(n)),
            None => (0, None),
        }
    }
}

impl<K: Clone, V: Clone> FusedIterator for Traversal<K, V> {}

// =============================================================================
// Cursor
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// `move_next` has not been called yet.
    NotStarted,
    /// Positioned on an element (or on the slot of a removed one).
    Active,
    /// Past the last element; terminal.
    Exhausted,
}

struct Guard {
    counter: Arc<AtomicU64>,
    expected: u64,
}

impl Guard {
    fn check(&self) -> Result<()> {
        if self.counter.load(Ordering::Relaxed) != self.expected {
            return Err(Error::ConcurrentModification);
        }
        Ok(())
    }
}

/// A single-pass cursor over a trie snapshot.
///
/// Cursors from [`ChampBuilder::cursor`] fail with
/// [`Error::ConcurrentModification`] once the builder adds or removes a key,
/// except through [`remove_current`](Cursor::remove_current).
///
/// ```rust
/// use champ_rs::{ChampBuilder, CursorState};
///
/// let mut builder = ChampBuilder::new();
/// builder.insert_all((0..10u32).map(|i| (i, i))).unwrap();
///
/// let mut cursor = builder.cursor();
/// while cursor.move_next().unwrap() {
///     let (key, _) = cursor.current().unwrap();
///     if key % 2 == 0 {
///         cursor.remove_current(&mut builder).unwrap();
///     }
/// }
/// assert_eq!(cursor.state(), CursorState::Exhausted);
/// assert_eq!(builder.len(), 5);
/// ```
pub struct Cursor<K, V> {
    traversal: Traversal<K, V>,
    current: Option<(Arc<Node<K, V>>, usize)>,
    state: CursorState,
    guard: Option<Guard>,
}

impl<K, V> Cursor<K, V> {
    pub(crate) fn snapshot(root: Arc<Node<K, V>>, len: usize) -> Self {
        Cursor {
            traversal: Traversal::new(root, len),
            current: None,
            state: CursorState::NotStarted,
            guard: None,
        }
    }

    pub(crate) fn tracking(root: Arc<Node<K, V>>, len: usize, counter: Arc<AtomicU64>) -> Self {
        let expected = counter.load(Ordering::Relaxed);
        Cursor {
            guard: Some(Guard { counter, expected }),
            ..Self::snapshot(root, len)
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Advances to the next element; `Ok(false)` once exhausted.
    pub fn move_next(&mut self) -> Result<bool> {
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }
        if let Some(guard) = &self.guard {
            guard.check()?;
        }
        match self.traversal.advance() {
            Some((node, idx)) => {
                self.current = Some((Arc::clone(node), idx));
                self.state = CursorState::Active;
                Ok(true)
            }
            None => {
                self.current = None;
                self.state = CursorState::Exhausted;
                Ok(false)
            }
        }
    }

    /// The element the cursor is positioned on.
    pub fn current(&self) -> Option<(&K, &V)> {
        self.current.as_ref().map(|(node, idx)| {
            let entry = &node.entries()[*idx];
            (&entry.key, &entry.value)
        })
    }

    /// Number of elements not yet visited, when cheaply known.
    pub fn estimate_size(&self) -> Option<usize> {
        self.traversal.remaining()
    }

    /// Splits off part of the elements not yet visited into a new cursor.
    ///
    /// Both cursors keep watching the same builder, if any.
    pub fn split(&mut self) -> Option<Self> {
        if self.state == CursorState::Exhausted {
            return None;
        }
        let traversal = self.traversal.split()?;
        let guard = self.guard.as_ref().map(|g| Guard {
            counter: Arc::clone(&g.counter),
            expected: g.expected,
        });
        Some(Cursor {
            traversal,
            current: None,
            state: CursorState::NotStarted,
            guard,
        })
    }
}

impl<K: Clone, V: Clone> Cursor<K, V> {
    /// Removes the current element from `builder` and returns its value.
    ///
    /// The cursor stays valid and continues with the next element.
    pub fn remove_current<S>(&mut self, builder: &mut ChampBuilder<K, V, S>) -> Result<V>
    where
        K: Hash + Eq,
        S: BuildHasher + Clone,
    {
        let Some(guard) = self.guard.as_mut() else {
            return Err(Error::Unsupported {
                operation: "remove through a snapshot cursor",
            });
        };
        if !Arc::ptr_eq(&guard.counter, builder.mod_count()) {
            return Err(Error::InvalidArgument {
                message: "cursor belongs to a different builder",
            });
        }
        guard.check()?;
        let Some((node, idx)) = self.current.take() else {
            return Err(Error::IllegalState {
                message: "cursor has no current element",
            });
        };

        let key = node.entries()[idx].key.clone();
        match builder.remove(&key) {
            Ok(Some(value)) => {
                guard.expected = guard.counter.load(Ordering::Relaxed);
                Ok(value)
            }
            Ok(None) => Err(Error::IllegalState {
                message: "current element is no longer present",
            }),
            Err(e) => {
                self.current = Some((node, idx));
                Err(e)
            }
        }
    }
}

impl<K: Clone, V: Clone> Iterator for Cursor<K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.current().map(|(k, v)| Ok((k.clone(), v.clone()))),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

//! One hash bucket of the buffer cache: an index-linked circular list of
//! slots plus the identity and reference count of each member.
//!
//! The bucket owns the bookkeeping of the slots linked into it. Moving a
//! slot to another bucket moves its [`Meta`] along with it, so a slot's
//! identity and count are always guarded by the lock of the bucket that
//! currently holds it.

use crate::block::BlockId;

/// Multiply-xor-shift mix of `dev * 31 + block`, reduced to a bucket index.
///
/// Spreads sequential block numbers over all buckets.
#[must_use]
pub fn bucket_of(id: BlockId, nbucket: usize) -> usize {
    let mut key = id.dev.wrapping_mul(31).wrapping_add(id.block);
    key = ((key >> 16) ^ key).wrapping_mul(0x045d_9f3b);
    key = ((key >> 16) ^ key).wrapping_mul(0x045d_9f3b);
    key = (key >> 16) ^ key;
    key as usize % nbucket
}

/// Identity and reference count of a slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Meta {
    /// `None` until the slot first caches a block.
    pub(crate) id: Option<BlockId>,
    pub(crate) refcnt: u32,
}

impl Meta {
    pub(crate) const UNUSED: Self = Self {
        id: None,
        refcnt: 0,
    };

    pub(crate) const fn claimed(id: BlockId) -> Self {
        Self {
            id: Some(id),
            refcnt: 1,
        }
    }
}

#[derive(Copy, Clone)]
struct Node {
    prev: usize,
    next: usize,
    linked: bool,
    meta: Meta,
}

impl Node {
    const UNLINKED: Self = Self {
        prev: 0,
        next: 0,
        linked: false,
        meta: Meta::UNUSED,
    };
}

pub(crate) struct Bucket<const NBUF: usize> {
    /// Most recently inserted slot; `nodes[head].prev` is the tail.
    head: Option<usize>,
    len: usize,
    /// Indexed by slot; only entries with `linked` belong to this bucket.
    nodes: [Node; NBUF],
}

impl<const NBUF: usize> Bucket<NBUF> {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            len: 0,
            nodes: [Node::UNLINKED; NBUF],
        }
    }

    /// Bucket `index` of `nbucket`, holding slots `index, index + nbucket, ...`.
    pub(crate) fn seeded(index: usize, nbucket: usize) -> Self {
        let mut bucket = Self::new();
        for slot in (index..NBUF).step_by(nbucket) {
            bucket.push_front(slot, Meta::UNUSED);
        }
        bucket
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Members from head to tail.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Meta)> + '_ {
        let mut cursor = self.head;
        (0..self.len).filter_map(move |_| {
            let slot = cursor?;
            let node = &self.nodes[slot];
            cursor = Some(node.next);
            Some((slot, &node.meta))
        })
    }

    /// A member caching `id`, referenced or not.
    pub(crate) fn find(&self, id: BlockId) -> Option<usize> {
        self.iter()
            .find(|(_, meta)| meta.id == Some(id))
            .map(|(slot, _)| slot)
    }

    /// The first member nobody references, in list order.
    pub(crate) fn find_unused(&self) -> Option<usize> {
        self.iter()
            .find(|(_, meta)| meta.refcnt == 0)
            .map(|(slot, _)| slot)
    }

    pub(crate) fn meta(&self, slot: usize) -> Option<&Meta> {
        let node = &self.nodes[slot];
        node.linked.then_some(&node.meta)
    }

    pub(crate) fn meta_mut(&mut self, slot: usize) -> Option<&mut Meta> {
        let node = &mut self.nodes[slot];
        node.linked.then_some(&mut node.meta)
    }

    pub(crate) fn push_front(&mut self, slot: usize, meta: Meta) {
        debug_assert!(!self.nodes[slot].linked, "slot {slot} linked twice");
        let (prev, next) = match self.head {
            None => (slot, slot),
            Some(head) => {
                let tail = self.nodes[head].prev;
                self.nodes[tail].next = slot;
                self.nodes[head].prev = slot;
                (tail, head)
            }
        };
        self.nodes[slot] = Node {
            prev,
            next,
            linked: true,
            meta,
        };
        self.head = Some(slot);
        self.len += 1;
    }

    /// Remove `slot` and hand back its bookkeeping.
    pub(crate) fn unlink(&mut self, slot: usize) -> Meta {
        let node = self.nodes[slot];
        debug_assert!(node.linked, "slot {slot} not in this bucket");
        if self.len == 1 {
            self.head = None;
        } else {
            self.nodes[node.prev].next = node.next;
            self.nodes[node.next].prev = node.prev;
            if self.head == Some(slot) {
                self.head = Some(node.next);
            }
        }
        self.nodes[slot] = Node::UNLINKED;
        self.len -= 1;
        node.meta
    }
}

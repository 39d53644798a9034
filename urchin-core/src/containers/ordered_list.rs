use std::mem::MaybeUninit;
use std::ptr;

use crate::containers::markable::MarkableRef;
use crate::containers::OrderedContainer;
use crate::reclaim::Reclaim;

type NodePtr<T> = *mut Node<T>;

//
// Lock-free sorted singly-linked list, after Harris's "A Pragmatic
// Implementation of Non-Blocking Linked-Lists" with Michael's helping
// traversal.
//
// List structure (sorted ascending by key):
//
//   HEAD(0) ───► 10 ───► 20 ───► 30 ───► TAIL(MAX)
//
// The mark on node.next means the NODE is logically deleted. Removal is
// two-phase:
//
//   Phase 1: LOGICAL  - flip the mark on curr.next          (linearization)
//   Phase 2: PHYSICAL - CAS pred.next from curr to curr's successor
//
// Any traversal that runs into a marked successor helps complete phase 2
// before moving on. The thread that wins the mark owns the removal; it
// must see the node physically unlinked before handing it to the
// reclaimer, because a reader entering a protection region after the
// retire is not covered by the reclamation contract and must not be able
// to reach the node.
//
// INVARIANTS:
// 1. The level chain from HEAD is sorted strictly ascending.
// 2. No two live nodes share a key.
// 3. A node's mark never reverts once set.
// 4. HEAD and TAIL are never marked and never reclaimed.
//
struct Node<T> {
    key: u64,
    value: MaybeUninit<T>,
    next: MarkableRef<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(key: u64, value: T) -> NodePtr<T> {
        Box::into_raw(Box::new(Node {
            key,
            value: MaybeUninit::new(value),
            next: MarkableRef::null(),
        }))
    }

    fn alloc_sentinel(key: u64) -> NodePtr<T> {
        Box::into_raw(Box::new(Node {
            key,
            value: MaybeUninit::uninit(),
            next: MarkableRef::null(),
        }))
    }

    /// Free the node without touching the value slot.
    ///
    /// # Safety
    /// `node` must come from `alloc`/`alloc_sentinel`, be unreachable, and
    /// its value must have been taken or never initialized.
    unsafe fn dealloc(node: NodePtr<T>) {
        unsafe { drop(Box::from_raw(node)) };
    }

    /// Free the node and drop the value it still owns.
    ///
    /// # Safety
    /// As `dealloc`, but the value slot must be initialized.
    unsafe fn dealloc_with_value(node: NodePtr<T>) {
        unsafe {
            ptr::drop_in_place((*node).value.as_mut_ptr());
            drop(Box::from_raw(node));
        }
    }
}

/// Lock-free sorted list over unique `u64` keys.
///
/// All operations are non-blocking; `contains` and `get` are wait-free
/// walks that never help with unlinking.
pub struct OrderedList<T, R: Reclaim> {
    head: NodePtr<T>,
    tail: NodePtr<T>,
    /// Removed nodes are retired through this instance and destroyed once
    /// no protected reader can observe them.
    reclaim: R,
}

unsafe impl<T: Send, R: Reclaim> Send for OrderedList<T, R> {}
unsafe impl<T: Send + Sync, R: Reclaim> Sync for OrderedList<T, R> {}

impl<T, R: Reclaim> OrderedList<T, R> {
    pub fn new() -> Self {
        let tail = Node::alloc_sentinel(u64::MAX);
        let head = Node::alloc_sentinel(0);
        unsafe { (*head).next.store(tail, false) };
        OrderedList {
            head,
            tail,
            reclaim: R::default(),
        }
    }

    /// Locate the window for `key`: returns `(pred, curr)` with
    /// `pred.key < key <= curr.key`, both observed live, `curr` possibly
    /// the tail sentinel.
    ///
    /// Marked successors encountered on the way are snipped out; a failed
    /// snip means the predecessor itself changed underneath us, so the
    /// whole traversal restarts from head.
    fn find(&self, key: u64) -> (NodePtr<T>, NodePtr<T>) {
        'retry: loop {
            let mut pred = self.head;
            let mut curr = unsafe { (*pred).next.get_ptr() };
            loop {
                let (mut succ, mut marked) = unsafe { (*curr).next.load() };
                while marked {
                    if !unsafe { (*pred).next.cas(curr, succ, false, false) } {
                        continue 'retry;
                    }
                    curr = succ;
                    let next = unsafe { (*curr).next.load() };
                    succ = next.0;
                    marked = next.1;
                }
                if unsafe { (*curr).key } >= key {
                    return (pred, curr);
                }
                pred = curr;
                curr = succ;
            }
        }
    }

    /// Inserts `value` under `key`; `false` if the key is already present.
    pub fn add(&self, key: u64, value: T) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        let node = Node::alloc(key, value);
        loop {
            let (pred, curr) = self.find(key);
            if unsafe { (*curr).key } == key {
                // never published, still exclusively ours
                unsafe { Node::dealloc_with_value(node) };
                return false;
            }
            unsafe { (*node).next.store(curr, false) };
            if unsafe { (*pred).next.cas(curr, node, false, false) } {
                return true;
            }
        }
    }

    /// Removes the entry for `key`; `false` if absent.
    pub fn remove(&self, key: u64) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        loop {
            let (pred, curr) = self.find(key);
            if unsafe { (*curr).key } != key {
                return false;
            }
            let (succ, marked) = unsafe { (*curr).next.load() };
            if marked {
                // another removal owns curr; the next find() pass will
                // report the key absent once it is snipped
                continue;
            }
            // Full-pair CAS, not attempt_mark: the first thread to flip the
            // mark owns the removal, and attempt_mark reports success when
            // the mark is already set.
            if !unsafe { (*curr).next.cas(succ, succ, false, true) } {
                continue;
            }
            // We own curr. It must be unreachable before it is retired.
            if !unsafe { (*pred).next.cas(curr, succ, false, false) } {
                self.find(key);
            }
            unsafe { self.reclaim.retire(curr, Node::dealloc_with_value) };
            return true;
        }
    }

    /// Wait-free membership test.
    pub fn contains(&self, key: u64) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        let mut curr = unsafe { (*self.head).next.get_ptr() };
        loop {
            let (succ, marked) = unsafe { (*curr).next.load() };
            if unsafe { (*curr).key } >= key {
                return unsafe { (*curr).key } == key && !marked;
            }
            curr = succ;
        }
    }

    /// Borrow the value under `key` if present and live at the moment
    /// observed.
    pub fn get(&self, key: u64) -> Option<R::GuardedRef<'_, T>> {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        let mut curr = unsafe { (*self.head).next.get_ptr() };
        unsafe {
            while (*curr).key < key {
                curr = (*curr).next.get_ptr();
            }
            if (*curr).key == key && !(*curr).next.get_mark() {
                return Some(R::make_ref((*curr).value.as_ptr()));
            }
        }
        None
    }

    /// Emptiness peek: head's successor is the tail sentinel.
    pub fn is_empty(&self) -> bool {
        let _guard = R::enter();
        unsafe { (*self.head).next.get_ptr() == self.tail }
    }
}

impl<T, R: Reclaim> Default for OrderedList<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R: Reclaim> Drop for OrderedList<T, R> {
    fn drop(&mut self) {
        unsafe {
            let mut curr = (*self.head).next.get_ptr();
            while curr != self.tail {
                let (next, marked) = (*curr).next.load();
                // every removal completes its unlink before returning, so
                // no marked node can still be on the chain at drop time
                debug_assert!(!marked, "logically removed node still linked at drop");
                Node::dealloc_with_value(curr);
                curr = next;
            }
            Node::dealloc(self.head);
            Node::dealloc(self.tail);
        }
    }
}

impl<T: Send + Sync, R: Reclaim> OrderedContainer<T> for OrderedList<T, R> {
    type Reclaim = R;

    #[inline]
    fn add(&self, key: u64, value: T) -> bool {
        OrderedList::add(self, key, value)
    }

    #[inline]
    fn remove(&self, key: u64) -> bool {
        OrderedList::remove(self, key)
    }

    #[inline]
    fn contains(&self, key: u64) -> bool {
        OrderedList::contains(self, key)
    }

    #[inline]
    fn get(&self, key: u64) -> Option<R::GuardedRef<'_, T>> {
        OrderedList::get(self, key)
    }
}

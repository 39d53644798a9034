use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

use crate::containers::markable::MarkableRef;
use crate::containers::OrderedContainer;
use crate::reclaim::Reclaim;

/// Top tower index; towers span `MAX_LEVEL + 1` levels.
const MAX_LEVEL: usize = 16;
const LEVELS: usize = MAX_LEVEL + 1;

type SkipNodePtr<T> = *mut SkipNode<T>;

//
// Lock-free skip list, after the Herlihy-Shavit adaptation of the
// Harris-Michael protocol to multiple levels.
//
// Structure (sorted ascending, head/tail sentinels frame every level):
//
//   Level 2:  HEAD ──────────────────────► 30 ─────────────► TAIL
//   Level 1:  HEAD ──────────► 20 ───────► 30 ─────────────► TAIL
//   Level 0:  HEAD ───► 10 ──► 20 ───────► 30 ──────► 40 ──► TAIL
//
// The mark on node.links[level] means the node is logically deleted at
// that level. Removal marks top-down; the level-0 mark is the
// linearization point and decides ownership. Insertion publishes at level
// 0 first (membership linearization) and then builds the tower upward,
// a continuation that is allowed to lag and aborts once the node is
// observed marked.
//
// RETIREMENT:
// A tower builder can install an upper-level link after a remover has
// already seen the node unlinked everywhere, so no fixed point in remove
// is safe to retire at. Every node instead carries a link reference count
// (one per tower level plus one for the builder); whichever CAS physically
// unlinks a level releases one reference, the builder releases abandoned
// levels and its own handle, and the node is handed to the reclaimer by
// whoever drains the count. Remove and pop_min finish with a find() pass
// so the count drains before they return.
//
// INVARIANTS:
// 1. Every level chain from HEAD is sorted strictly ascending.
// 2. A node's level-0 mark never reverts; higher-level marks are set
//    before it (remove proceeds top-down).
// 3. A node is reachable at level 0 before any higher level.
// 4. HEAD and TAIL are never marked and never reclaimed.
//

/// A skip-list node with its tower allocated inline.
///
/// Single allocation per node: the `links` flexible tail holds
/// `top + 1` successor pairs laid out right after the fields.
#[repr(C)]
struct SkipNode<T> {
    key: u64,
    /// Top tower index; fixed at creation, `links` spans `0..=top`.
    top: usize,
    /// Outstanding link references: one per tower level plus one for the
    /// inserting thread. Drained to zero, the node is retired.
    refs: AtomicUsize,
    value: MaybeUninit<T>,
    links: [MarkableRef<SkipNode<T>>; 0],
}

impl<T> SkipNode<T> {
    fn layout(top: usize) -> Layout {
        Layout::new::<Self>()
            .extend(Layout::array::<MarkableRef<Self>>(top + 1).unwrap())
            .unwrap()
            .0
            .pad_to_align()
    }

    fn alloc(key: u64, value: MaybeUninit<T>, top: usize, refs: usize) -> SkipNodePtr<T> {
        unsafe {
            let layout = Self::layout(top);
            let node = alloc(layout) as SkipNodePtr<T>;
            if node.is_null() {
                handle_alloc_error(layout);
            }
            ptr::write(&mut (*node).key, key);
            ptr::write(&mut (*node).top, top);
            ptr::write(&mut (*node).refs, AtomicUsize::new(refs));
            ptr::write(&mut (*node).value, value);
            let links = (*node).links.as_ptr() as *mut MarkableRef<Self>;
            for level in 0..=top {
                ptr::write(links.add(level), MarkableRef::null());
            }
            node
        }
    }

    /// Free the node without touching the value slot.
    ///
    /// # Safety
    /// `node` must come from `alloc`, be unreachable, and its value must
    /// have been taken or never initialized.
    unsafe fn dealloc(node: SkipNodePtr<T>) {
        unsafe {
            let layout = Self::layout((*node).top);
            dealloc(node as *mut u8, layout);
        }
    }

    /// Free the node and drop the value it still owns.
    ///
    /// # Safety
    /// As `dealloc`, but the value slot must be initialized.
    unsafe fn dealloc_with_value(node: SkipNodePtr<T>) {
        unsafe {
            ptr::drop_in_place((*node).value.as_mut_ptr());
            Self::dealloc(node);
        }
    }

    /// Successor pair at `level`.
    #[inline]
    fn link(&self, level: usize) -> &MarkableRef<Self> {
        debug_assert!(level <= self.top);
        unsafe { &*self.links.as_ptr().add(level) }
    }

    /// Release `n` link references; the releaser that drains the count
    /// hands the node to the reclaimer.
    ///
    /// The release/acquire pairing makes every unlinking CAS visible to
    /// the thread that performs the retirement.
    fn release_refs<R: Reclaim>(&self, n: usize, reclaim: &R) {
        if self.refs.fetch_sub(n, Ordering::Release) == n {
            fence(Ordering::Acquire);
            unsafe { reclaim.retire(self as *const Self as *mut Self, Self::dealloc) };
        }
    }
}

/// Geometric level oracle with p = 0.5: level k with probability
/// 2^-(k+1), clamped to `MAX_LEVEL`. Counting trailing ones of a single
/// random word replaces a loop of coin-flip RNG calls.
#[inline]
fn random_level() -> usize {
    (fastrand::u32(..).trailing_ones() as usize).min(MAX_LEVEL)
}

/// Drop a value that was moved out of a removed node.
///
/// # Safety
/// `value` must come from `Box::into_raw` and be dropped exactly once.
unsafe fn drop_boxed<T>(value: *mut T) {
    unsafe { drop(Box::from_raw(value)) };
}

/// Lock-free skip list over unique `u64` keys.
///
/// Supports the ordered-container operations plus [`pop_min`], which
/// removes and returns the value under the smallest key - the contract of
/// a concurrent priority queue.
///
/// [`pop_min`]: SkipList::pop_min
pub struct SkipList<T, R: Reclaim> {
    head: SkipNodePtr<T>,
    tail: SkipNodePtr<T>,
    reclaim: R,
}

unsafe impl<T: Send, R: Reclaim> Send for SkipList<T, R> {}
unsafe impl<T: Send + Sync, R: Reclaim> Sync for SkipList<T, R> {}

impl<T, R: Reclaim> SkipList<T, R> {
    pub fn new() -> Self {
        // Sentinels take the full tower height and hold no link references;
        // they are never marked, unlinked or retired.
        let tail = SkipNode::alloc(u64::MAX, MaybeUninit::uninit(), MAX_LEVEL, 0);
        let head = SkipNode::alloc(0, MaybeUninit::uninit(), MAX_LEVEL, 0);
        unsafe {
            for level in 0..=MAX_LEVEL {
                (*head).link(level).store(tail, false);
            }
        }
        SkipList {
            head,
            tail,
            reclaim: R::default(),
        }
    }

    /// Locate `key` at every level, snipping logically removed nodes on
    /// the way down. On return `preds[level].key < key <= succs[level].key`
    /// for every level, both observed live at that level. Returns whether
    /// the level-0 successor carries `key`.
    ///
    /// A failed snip means the predecessor changed underneath us; the
    /// whole search restarts from the top.
    fn find(
        &self,
        key: u64,
        preds: &mut [SkipNodePtr<T>; LEVELS],
        succs: &mut [SkipNodePtr<T>; LEVELS],
    ) -> bool {
        'retry: loop {
            let mut pred = self.head;
            for level in (0..=MAX_LEVEL).rev() {
                let mut curr = unsafe { (*pred).link(level).get_ptr() };
                loop {
                    let (mut succ, mut marked) = unsafe { (*curr).link(level).load() };
                    while marked {
                        if !unsafe { (*pred).link(level).cas(curr, succ, false, false) } {
                            continue 'retry;
                        }
                        unsafe { (*curr).release_refs(1, &self.reclaim) };
                        curr = succ;
                        let next = unsafe { (*curr).link(level).load() };
                        succ = next.0;
                        marked = next.1;
                    }
                    if unsafe { (*curr).key } < key {
                        pred = curr;
                        curr = succ;
                    } else {
                        break;
                    }
                }
                preds[level] = pred;
                succs[level] = curr;
            }
            return unsafe { (*succs[0]).key } == key;
        }
    }

    /// Read-only top-down search that never CASes: marked nodes are
    /// stepped over, not snipped. Returns the level-0 candidate if it
    /// carries `key` and its pair read live at the observing load.
    fn search(&self, key: u64) -> Option<SkipNodePtr<T>> {
        let mut pred = self.head;
        for level in (0..=MAX_LEVEL).rev() {
            let mut curr = unsafe { (*pred).link(level).get_ptr() };
            loop {
                let (succ, marked) = unsafe { (*curr).link(level).load() };
                if marked {
                    curr = succ;
                    continue;
                }
                if unsafe { (*curr).key } < key {
                    pred = curr;
                    curr = succ;
                } else if level > 0 {
                    break;
                } else {
                    // the load above observed the level-0 pair live
                    return (unsafe { (*curr).key } == key).then_some(curr);
                }
            }
        }
        unreachable!("the level-0 walk always returns")
    }

    /// Inserts `value` under `key`; `false` if the key is already present.
    ///
    /// The bottom-level CAS is the linearization point: the node is a
    /// member as soon as it succeeds. Building the tower above is an
    /// index-building continuation that may lag behind and gives up as
    /// soon as the node is observed marked.
    pub fn add(&self, key: u64, value: T) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        let mut preds = [ptr::null_mut(); LEVELS];
        let mut succs = [ptr::null_mut(); LEVELS];

        let top = random_level();
        let node = SkipNode::alloc(key, MaybeUninit::new(value), top, top + 2);

        loop {
            if self.find(key, &mut preds, &mut succs) {
                // never published, still exclusively ours
                unsafe { SkipNode::dealloc_with_value(node) };
                return false;
            }
            unsafe {
                for level in 0..=top {
                    (*node).link(level).store(succs[level], false);
                }
                if (*preds[0]).link(0).cas(succs[0], node, false, false) {
                    break;
                }
            }
        }

        unsafe {
            'build: for level in 1..=top {
                loop {
                    let (fwd, marked) = (*node).link(level).load();
                    if marked {
                        // a removal owns the node; this level and the ones
                        // above will never be linked
                        (*node).release_refs(top - level + 1, &self.reclaim);
                        break 'build;
                    }
                    let succ = succs[level];
                    if fwd != succ && !(*node).link(level).cas(fwd, succ, false, false) {
                        // only a concurrent mark changes our own link
                        (*node).release_refs(top - level + 1, &self.reclaim);
                        break 'build;
                    }
                    if (*preds[level]).link(level).cas(succ, node, false, false) {
                        break;
                    }
                    // the window moved underneath us; reposition
                    if !self.find(key, &mut preds, &mut succs) || succs[0] != node {
                        (*node).release_refs(top - level + 1, &self.reclaim);
                        break 'build;
                    }
                }
            }
            (*node).release_refs(1, &self.reclaim);
        }
        true
    }

    /// Removes the entry for `key`; `false` if absent or if another
    /// removal won the race for it.
    pub fn remove(&self, key: u64) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        let mut preds = [ptr::null_mut(); LEVELS];
        let mut succs = [ptr::null_mut(); LEVELS];

        if !self.find(key, &mut preds, &mut succs) {
            return false;
        }
        let victim = succs[0];
        unsafe {
            // Logical removal proceeds top-down; observing a level already
            // marked is as good as marking it ourselves.
            for level in (1..=(*victim).top).rev() {
                loop {
                    let (succ, marked) = (*victim).link(level).load();
                    if marked || (*victim).link(level).attempt_mark(succ, true) {
                        break;
                    }
                }
            }
            // Level 0 decides ownership: the first pair CAS to flip the
            // mark wins, everyone else lost to a concurrent removal.
            loop {
                let (succ, marked) = (*victim).link(0).load();
                if marked {
                    return false;
                }
                if (*victim).link(0).cas(succ, succ, false, true) {
                    // The winner takes the payload. Readers that observed
                    // the node live may still borrow it, so its destruction
                    // is deferred like the node's.
                    let value = ptr::read((*victim).value.as_ptr());
                    self.reclaim.retire(Box::into_raw(Box::new(value)), drop_boxed::<T>);
                    // Unlink every level so the reference count drains.
                    self.find(key, &mut preds, &mut succs);
                    return true;
                }
            }
        }
    }

    /// Wait-free membership test.
    pub fn contains(&self, key: u64) -> bool {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        self.search(key).is_some()
    }

    /// Borrow the value under `key` if present and live at the moment
    /// observed.
    pub fn get(&self, key: u64) -> Option<R::GuardedRef<'_, T>> {
        debug_assert!(key < u64::MAX, "the tail sentinel key is reserved");
        let _guard = R::enter();
        self.search(key)
            .map(|node| unsafe { R::make_ref((*node).value.as_ptr()) })
    }

    /// Removes the entry with the smallest key and returns its value.
    ///
    /// Linearizes at the successful mark CAS on the current minimum.
    /// Ownership of the value passes to the caller; a reader that borrowed
    /// it through [`get`](SkipList::get) just before the removal won must
    /// not be assumed to outlast the caller's use of the value.
    pub fn pop_min(&self) -> Option<T> {
        let _guard = R::enter();
        let mut preds = [ptr::null_mut(); LEVELS];
        let mut succs = [ptr::null_mut(); LEVELS];

        loop {
            let curr = unsafe { (*self.head).link(0).get_ptr() };
            if curr == self.tail {
                return None;
            }
            unsafe {
                let (succ, marked) = (*curr).link(0).load();
                if marked {
                    // someone else claimed the minimum; help move head past
                    // it and retry
                    if (*self.head).link(0).cas(curr, succ, false, false) {
                        (*curr).release_refs(1, &self.reclaim);
                    }
                    continue;
                }
                if !(*curr).link(0).cas(succ, succ, false, true) {
                    continue;
                }
                // This call owns the removal.
                let key = (*curr).key;
                let value = ptr::read((*curr).value.as_ptr());
                // Finish the tower marks so traversals can unlink the
                // upper levels too.
                for level in (1..=(*curr).top).rev() {
                    loop {
                        let (s, m) = (*curr).link(level).load();
                        if m || (*curr).link(level).attempt_mark(s, true) {
                            break;
                        }
                    }
                }
                if (*self.head).link(0).cas(curr, succ, false, false) {
                    (*curr).release_refs(1, &self.reclaim);
                }
                self.find(key, &mut preds, &mut succs);
                return Some(value);
            }
        }
    }

    /// Emptiness peek: head's bottom-level successor is the tail sentinel.
    pub fn is_empty(&self) -> bool {
        let _guard = R::enter();
        unsafe { (*self.head).link(0).get_ptr() == self.tail }
    }
}

impl<T, R: Reclaim> Default for SkipList<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R: Reclaim> Drop for SkipList<T, R> {
    fn drop(&mut self) {
        unsafe {
            let mut curr = (*self.head).link(0).get_ptr();
            while curr != self.tail {
                let (next, marked) = (*curr).link(0).load();
                // every removal drains the node's references before
                // returning, so no marked node can still be linked here
                debug_assert!(!marked, "logically removed node still linked at drop");
                SkipNode::dealloc_with_value(curr);
                curr = next;
            }
            SkipNode::dealloc(self.head);
            SkipNode::dealloc(self.tail);
        }
    }
}

impl<T: Send + Sync, R: Reclaim> OrderedContainer<T> for SkipList<T, R> {
    type Reclaim = R;

    #[inline]
    fn add(&self, key: u64, value: T) -> bool {
        SkipList::add(self, key, value)
    }

    #[inline]
    fn remove(&self, key: u64) -> bool {
        SkipList::remove(self, key)
    }

    #[inline]
    fn contains(&self, key: u64) -> bool {
        SkipList::contains(self, key)
    }

    #[inline]
    fn get(&self, key: u64) -> Option<R::GuardedRef<'_, T>> {
        SkipList::get(self, key)
    }
}

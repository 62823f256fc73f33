//! Deferred work: persisting dirty pairing records and recycling cube
//! records, run from a non-interrupt task context after the ISR posts
//! flags for it.

use strum::EnumCount;

use crate::bitset::AtomicBitset32;
use crate::store::{PersistentStore, StoreError};

/// Kinds of deferred work the ISR can post for the task context to run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumCount)]
#[repr(usize)]
pub enum WorkItem {
    SavePairingId = 0,
    SavePairingMru = 1,
    RecyclePairings = 2,
}

/// Atomic set of pending `WorkItem`s, settable from ISR context and
/// drained from task context. Both sides use the same atomic primitives:
/// set uses atomic-mark, drain uses atomic clear-then-read so flags raised
/// during the task's own run are picked up on its next wake rather than
/// lost.
#[derive(Default)]
pub struct TaskWork {
    bits: AtomicBitset32,
}

impl TaskWork {
    pub const fn new() -> Self {
        Self { bits: AtomicBitset32::new() }
    }

    pub fn atomic_mark(&self, item: WorkItem) {
        self.bits.atomic_mark(item as usize);
    }

    pub fn test(&self, item: WorkItem) -> bool {
        self.bits.test(item as usize)
    }

    fn clear_first(&self) -> Option<WorkItem> {
        self.bits.clear_first().map(item_from_index)
    }

    /// Snapshot the currently-pending work kinds, as a bitset over
    /// `WorkItem` indices. Used by the task context to take a fixed
    /// round of work to perform, so that flags an ISR sets mid-task are
    /// picked up on the next wake rather than folded into this one.
    pub fn snapshot(&self) -> u32 {
        self.bits.snapshot()
    }

    fn atomic_clear(&self, item: WorkItem) {
        self.bits.atomic_clear(item as usize);
    }
}

fn item_from_index(idx: usize) -> WorkItem {
    match idx {
        0 => WorkItem::SavePairingId,
        1 => WorkItem::SavePairingMru,
        2 => WorkItem::RecyclePairings,
        _ => unreachable!("WorkItem::COUNT is {}", WorkItem::COUNT),
    }
}

/// Lowest-to-highest iterator over the set bits of a snapshotted bitset,
/// without touching the live atomic state it was taken from.
fn clear_first_local(bits: &mut u32) -> Option<usize> {
    if *bits == 0 {
        return None;
    }
    let idx = bits.trailing_zeros() as usize;
    *bits &= *bits - 1;
    Some(idx)
}

/// Runs one pass of deferred work: persists dirty records and recycles
/// pairing slots queued for deletion. Intended to be invoked from a
/// non-interrupt task context whenever it's woken by a `Tasks::trigger`
/// equivalent.
///
/// Snapshots `task_work` once at entry and only ever walks that local
/// copy: a flag an ISR sets while this call is still running is left
/// pending in the live `TaskWork` for the next wake, rather than being
/// folded into this pass.
///
/// Persistent-write failures are logged and swallowed (§7): the flag
/// simply isn't re-posted, so a failed write is retried only if something
/// dirties the record again.
pub fn run_deferred_task<const N: usize, P: PersistentStore<N>>(
    task_work: &TaskWork,
    recycle_queue: &AtomicBitset32,
    id: &crate::pairing::PairingIdRecord<N>,
    mru: &crate::pairing::PairingMruRecord<N>,
    store: &mut P,
) {
    let mut pending = task_work.snapshot();
    while let Some(idx) = clear_first_local(&mut pending) {
        let item = item_from_index(idx);
        task_work.atomic_clear(item);

        match item {
            WorkItem::SavePairingId => {
                if let Err(StoreError) = store.write_pairing_id(id) {
                    log::warn!("failed to persist pairing id record");
                }
            }
            WorkItem::SavePairingMru => {
                if let Err(StoreError) = store.write_pairing_mru(mru) {
                    log::warn!("failed to persist pairing mru record");
                }
            }
            WorkItem::RecyclePairings => {
                while let Some(index) = recycle_queue.clear_first() {
                    if let Err(StoreError) = store.delete_cube(index) {
                        log::warn!("failed to delete recycled cube record {}", index);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pairing::{PairingIdRecord, PairingMruRecord};
    use crate::store::mock::MockStore;

    #[test]
    fn mark_and_drain_all_three_kinds() {
        let work = TaskWork::new();
        work.atomic_mark(WorkItem::SavePairingMru);
        work.atomic_mark(WorkItem::SavePairingId);

        assert_eq!(work.clear_first(), Some(WorkItem::SavePairingId));
        assert_eq!(work.clear_first(), Some(WorkItem::SavePairingMru));
        assert_eq!(work.clear_first(), None);
    }

    #[test]
    fn run_deferred_task_persists_and_recycles() {
        let work = TaskWork::new();
        let recycle = AtomicBitset32::new();
        let mut store: MockStore<4> = MockStore::new();

        recycle.atomic_mark(2);
        work.atomic_mark(WorkItem::RecyclePairings);
        work.atomic_mark(WorkItem::SavePairingId);
        work.atomic_mark(WorkItem::SavePairingMru);

        let id = PairingIdRecord::<4>::empty();
        let mru = PairingMruRecord::<4>::identity();

        run_deferred_task(&work, &recycle, &id, &mru, &mut store);

        assert_eq!(store.deleted.as_slice(), &[2]);
        assert_eq!(store.id, id);
        assert_eq!(store.mru, mru);
        assert!(recycle.is_empty());
    }

    #[test]
    fn snapshot_does_not_clear_live_bits() {
        let work = TaskWork::new();
        work.atomic_mark(WorkItem::SavePairingId);

        assert_eq!(work.snapshot(), 0b001);
        assert!(work.test(WorkItem::SavePairingId));
    }

    #[test]
    fn a_flag_marked_after_the_snapshot_is_taken_is_not_in_this_rounds_walk() {
        // Mirrors an ISR posting a new flag partway through a task run:
        // the run must keep walking the snapshot it took at entry, so the
        // late flag stays set afterwards for the next wake to pick up.
        let work = TaskWork::new();
        work.atomic_mark(WorkItem::SavePairingId);

        let mut pending = work.snapshot();

        // "ISR" fires here, after the snapshot but before the walk below.
        work.atomic_mark(WorkItem::RecyclePairings);

        let mut seen = heapless::Vec::<WorkItem, 4>::new();
        while let Some(idx) = clear_first_local(&mut pending) {
            seen.push(item_from_index(idx)).unwrap();
        }

        assert_eq!(seen.as_slice(), &[WorkItem::SavePairingId]);
        assert!(work.test(WorkItem::RecyclePairings));
    }

    #[test]
    fn failed_write_is_swallowed_not_retried() {
        let work = TaskWork::new();
        let recycle = AtomicBitset32::new();
        let mut store: MockStore<4> = MockStore::new();
        store.fail_next_write = true;

        work.atomic_mark(WorkItem::SavePairingId);
        let id = PairingIdRecord::<4>::empty();
        let mru = PairingMruRecord::<4>::identity();

        run_deferred_task(&work, &recycle, &id, &mru, &mut store);

        assert!(!work.test(WorkItem::SavePairingId));
    }
}

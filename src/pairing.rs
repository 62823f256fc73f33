//! Persistent pairing records: the HWID table and its MRU ranking, plus
//! the logic for choosing a victim slot when pairing a new cube.

use log::error;

use crate::bitset::AtomicBitset32;
use crate::cubeslots::CubeSlots;
use crate::hwid::Hwid;
use crate::task::{TaskWork, WorkItem};

/// Key identifying a persisted per-cube pairing record: `kCubeBase + slot`.
pub type PairingKey = usize;

/// A persistent array, indexed by pairing slot, of HWIDs.
///
/// Invariant: every entry is either `Hwid::INVALID` or a genuine 8-byte
/// HWID reported by some cube.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairingIdRecord<const N: usize> {
    pub hwid: [Hwid; N],
}

impl<const N: usize> PairingIdRecord<N> {
    pub const fn empty() -> Self {
        Self { hwid: [Hwid::INVALID; N] }
    }
}

/// A persistent permutation of `0..N`, most-recently-used first.
///
/// Invariant: `rank` is always a permutation of `0..N`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairingMruRecord<const N: usize> {
    pub rank: [usize; N],
}

impl<const N: usize> PairingMruRecord<N> {
    pub const fn identity() -> Self {
        let mut rank = [0usize; N];
        let mut i = 0;
        while i < N {
            rank[i] = i;
            i += 1;
        }
        Self { rank }
    }

    /// Move `slot` to rank 0, shifting the displaced prefix down by one.
    /// Returns whether the permutation actually changed.
    pub fn access(&mut self, slot: usize) -> bool {
        let pos = match self.rank.iter().position(|&s| s == slot) {
            Some(p) => p,
            None => return false,
        };

        if pos == 0 {
            return false;
        }

        for i in (1..=pos).rev() {
            self.rank[i] = self.rank[i - 1];
        }
        self.rank[0] = slot;

        true
    }
}

/// Owns the two persistent records in memory and implements the victim
/// selection policy for pairing a new cube.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairingStore<const N: usize> {
    pub id: PairingIdRecord<N>,
    pub mru: PairingMruRecord<N>,
}

impl<const N: usize> PairingStore<N> {
    pub fn new(id: PairingIdRecord<N>, mru: PairingMruRecord<N>) -> Self {
        Self { id, mru }
    }

    /// Pick the pairing slot to overwrite for a newly-verified cube.
    ///
    /// Scans `mru.rank` from least- to most-recently-used, choosing the
    /// first slot whose cube isn't currently connected. That slot is
    /// scheduled for deletion of its old persisted record and overwritten
    /// with the new HWID.
    ///
    /// If every slot is currently connected, an arbitrary slot (the least
    /// recently used) is chosen and returned *without* touching `id.hwid` —
    /// preserved from the original firmware: the pairing attempt will fail
    /// downstream in a visible way rather than silently corrupting another
    /// cube's record. See the Open Question in the design notes.
    pub fn new_cube_record<S: CubeSlots>(
        &mut self,
        cube_slots: &S,
        hwid: Hwid,
        recycle_queue: &AtomicBitset32,
        task_work: &TaskWork,
    ) -> PairingKey {
        for i in (0..N).rev() {
            let index = self.mru.rank[i];
            if !cube_slots.pair_connected(index) {
                recycle_queue.atomic_mark(index);
                task_work.atomic_mark(WorkItem::RecyclePairings);

                self.id.hwid[index] = hwid;
                task_work.atomic_mark(WorkItem::SavePairingId);

                return index;
            }
        }

        // No free slot: fall back to the least-recently-used index without
        // mutating `id.hwid`, matching the upstream firmware's behavior.
        error!("new_cube_record: every pairing slot is connected, pairing will fail downstream");
        self.mru.rank[N - 1]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cubeslots::mock::MockCubeSlots;

    #[test]
    fn mru_record_is_identity_initially() {
        let mru = PairingMruRecord::<4>::identity();
        assert_eq!(mru.rank, [0, 1, 2, 3]);
    }

    #[test]
    fn access_moves_slot_to_front_and_shifts_prefix() {
        let mut mru = PairingMruRecord::<4>::identity();
        assert!(mru.access(2));
        assert_eq!(mru.rank, [2, 0, 1, 3]);
    }

    #[test]
    fn repeated_access_is_a_no_op() {
        let mut mru = PairingMruRecord::<4>::identity();
        assert!(mru.access(2));
        assert!(!mru.access(2));
        assert_eq!(mru.rank, [2, 0, 1, 3]);
    }

    #[test]
    fn access_already_at_front_returns_false() {
        let mut mru = PairingMruRecord::<4>::identity();
        assert!(!mru.access(0));
        assert_eq!(mru.rank, [0, 1, 2, 3]);
    }

    #[test]
    fn new_cube_record_evicts_least_recently_used_free_slot() {
        let mut store = PairingStore::<4>::new(PairingIdRecord::empty(), PairingMruRecord::identity());
        // Rank is [0,1,2,3] (lru-first scan order is rank[3],[2],[1],[0]).
        let cube_slots = MockCubeSlots::new();
        let recycle = AtomicBitset32::new();
        let work = TaskWork::new();

        let hwid = Hwid::from_u64(0xaabb_ccdd_eeff_0011);
        let key = store.new_cube_record(&cube_slots, hwid, &recycle, &work);

        assert_eq!(key, 3);
        assert!(recycle.test(3));
        assert!(work.test(WorkItem::RecyclePairings));
        assert!(work.test(WorkItem::SavePairingId));
        assert_eq!(store.id.hwid[3], hwid);
    }

    #[test]
    fn new_cube_record_skips_connected_slots() {
        let mut store = PairingStore::<4>::new(PairingIdRecord::empty(), PairingMruRecord::identity());
        let mut cube_slots = MockCubeSlots::new();
        cube_slots.set_pair_connected(3, true);
        cube_slots.set_pair_connected(2, true);
        let recycle = AtomicBitset32::new();
        let work = TaskWork::new();

        let hwid = Hwid::from_u64(1);
        let key = store.new_cube_record(&cube_slots, hwid, &recycle, &work);

        assert_eq!(key, 1);
        assert_eq!(store.id.hwid[1], hwid);
        assert_eq!(store.id.hwid[3], Hwid::INVALID);
    }

    #[test]
    fn new_cube_record_with_all_slots_connected_does_not_touch_hwid() {
        let mut store = PairingStore::<4>::new(PairingIdRecord::empty(), PairingMruRecord::identity());
        let mut cube_slots = MockCubeSlots::new();
        for i in 0..4 {
            cube_slots.set_pair_connected(i, true);
        }
        let recycle = AtomicBitset32::new();
        let work = TaskWork::new();

        let hwid = Hwid::from_u64(1);
        let key = store.new_cube_record(&cube_slots, hwid, &recycle, &work);

        assert_eq!(key, 3);
        assert!(!recycle.test(3));
        assert_eq!(store.id.hwid[3], Hwid::INVALID);
    }
}

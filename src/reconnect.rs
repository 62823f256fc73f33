//! Round-robin scheduler sharing airtime between pairing beacons and
//! reconnection attempts for already-known cubes.

use crate::address::{AddressFactory, RadioAddress};
use crate::bitset::AtomicBitset32;
use crate::cubeslots::CubeSlots;
use crate::hwid::Hwid;
use crate::pairing::{PairingIdRecord, PairingKey};

/// Everything `popReconnectQueue` hands back: the candidate's HWID, the
/// address to page it on, and the pairing record key to use if the
/// reconnect succeeds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReconnectCandidate {
    pub hwid: Hwid,
    pub addr: RadioAddress,
    pub pairing_key: PairingKey,
}

/// Bitset over pairing slots: "known, not connected, revisit this round".
#[derive(Default)]
pub struct ReconnectQueue {
    bits: AtomicBitset32,
}

impl ReconnectQueue {
    pub const fn new() -> Self {
        Self { bits: AtomicBitset32::new() }
    }

    /// Mark every pairing slot that has a known HWID and isn't currently
    /// connected. Called each time the state machine returns to
    /// `PairingFirstContact`, establishing a fresh round of candidates.
    pub fn refill<const N: usize, S: CubeSlots>(&self, cube_slots: &S, id: &PairingIdRecord<N>) {
        for i in 0..N {
            if cube_slots.pair_connected(i) {
                continue;
            }
            if id.hwid[i] == Hwid::INVALID {
                continue;
            }
            self.bits.mark(i);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Pop the next reconnect candidate, computing its reconnect address
    /// deterministically from its stored HWID.
    pub fn pop<const N: usize>(
        &self,
        id: &PairingIdRecord<N>,
        channel_count: u32,
    ) -> Option<ReconnectCandidate> {
        let index = self.bits.clear_first()?;
        let hwid = id.hwid[index];
        let addr = AddressFactory::from_hardware_id(hwid, channel_count);

        Some(ReconnectCandidate { hwid, addr, pairing_key: index })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cubeslots::mock::MockCubeSlots;

    #[test]
    fn refill_skips_connected_and_invalid_slots() {
        let queue = ReconnectQueue::new();
        let mut cube_slots = MockCubeSlots::new();
        cube_slots.set_pair_connected(0, true);

        let mut id = PairingIdRecord::<4>::empty();
        id.hwid[1] = Hwid::from_u64(1);
        id.hwid[2] = Hwid::from_u64(2);
        // slot 0 connected (skip), slot 1 valid+free, slot 2 valid+free, slot 3 invalid (skip)

        queue.refill(&cube_slots, &id);

        assert!(!queue.bits.test(0));
        assert!(queue.bits.test(1));
        assert!(queue.bits.test(2));
        assert!(!queue.bits.test(3));
    }

    #[test]
    fn invalid_hwid_slots_never_enter_the_queue() {
        let queue = ReconnectQueue::new();
        let cube_slots = MockCubeSlots::new();
        let id = PairingIdRecord::<4>::empty();

        queue.refill(&cube_slots, &id);

        for i in 0..4 {
            assert!(!queue.bits.test(i));
        }
    }

    #[test]
    fn pop_computes_deterministic_address_and_drains_lowest_first() {
        let queue = ReconnectQueue::new();
        let mut id = PairingIdRecord::<4>::empty();
        id.hwid[1] = Hwid::from_u64(0x1111);
        id.hwid[3] = Hwid::from_u64(0x3333);

        queue.bits.mark(3);
        queue.bits.mark(1);

        let first = queue.pop(&id, 64).unwrap();
        assert_eq!(first.pairing_key, 1);
        assert_eq!(first.hwid, Hwid::from_u64(0x1111));

        let second = queue.pop(&id, 64).unwrap();
        assert_eq!(second.pairing_key, 3);

        assert!(queue.pop(&id, 64).is_none());
    }
}

//! Cube-slot runtime contract, consumed by the connector. The per-cube
//! runtime itself (a "cube slot" owning a connected cube) lives outside
//! this crate; this trait is the seam between the two.

use crate::address::RadioAddress;
use crate::packet::AckPacket;
use crate::pairing::PairingKey;

/// Operations the connector needs from the per-cube runtime.
pub trait CubeSlots {
    /// Bitset of cube-runtime slot indices not currently in use.
    fn available_slots(&self) -> u32;

    /// Whether the pairing slot `index` currently has a live connection.
    fn pair_connected(&self, index: usize) -> bool;

    /// Whether cube-runtime slot `cube_id` is free to take a new handoff.
    fn is_slot_available(&self, cube_id: usize) -> bool;

    /// Hand a freshly-confirmed connection off to the cube-runtime slot.
    fn connect(&mut self, cube_id: usize, record_key: PairingKey, addr: RadioAddress, ack: &AckPacket);
}

/// Lowest-indexed available cube-runtime slot, or `None` if all are busy.
pub fn lowest_available_slot(slots: u32) -> Option<usize> {
    if slots == 0 {
        None
    } else {
        Some(slots.trailing_zeros() as usize)
    }
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use super::*;

    #[derive(Debug, PartialEq)]
    pub struct ConnectCall {
        pub cube_id: usize,
        pub record_key: PairingKey,
        pub addr: RadioAddress,
        pub ack: AckPacket,
    }

    pub struct MockCubeSlots {
        available: u32,
        pair_connected: u32,
        pub connects: heapless::Vec<ConnectCall, 4>,
    }

    impl MockCubeSlots {
        pub fn new() -> Self {
            Self { available: u32::MAX, pair_connected: 0, connects: heapless::Vec::new() }
        }

        pub fn set_available(&mut self, slots: u32) {
            self.available = slots;
        }

        pub fn set_pair_connected(&mut self, index: usize, connected: bool) {
            if connected {
                self.pair_connected |= 1 << index;
            } else {
                self.pair_connected &= !(1 << index);
            }
        }
    }

    impl CubeSlots for MockCubeSlots {
        fn available_slots(&self) -> u32 {
            self.available
        }

        fn pair_connected(&self, index: usize) -> bool {
            (self.pair_connected & (1 << index)) != 0
        }

        fn is_slot_available(&self, cube_id: usize) -> bool {
            (self.available & (1 << cube_id)) != 0
        }

        fn connect(&mut self, cube_id: usize, record_key: PairingKey, addr: RadioAddress, ack: &AckPacket) {
            let _ = self.connects.push(ConnectCall { cube_id, record_key, addr, ack: ack.clone() });
            self.available &= !(1 << cube_id);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowest_available_slot_picks_lowest_bit() {
        assert_eq!(lowest_available_slot(0b0110), Some(1));
        assert_eq!(lowest_available_slot(0), None);
    }
}

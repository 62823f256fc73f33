//! Rotating short-range "neighbor" beacon identity, used as a physical
//! co-presence proof during pairing. The neighbor-transmitter hardware
//! itself is an external collaborator.

use crate::address::RadioAddress;
use crate::config::{Config, FIRST_MASTER_ID, NUM_MASTER_ID};
use crate::entropy::Entropy;

/// Begins a continuous short-range beacon with a given 16-bit pattern and
/// mask. `CubeConnector` is the only caller; the hardware itself is out of
/// scope.
pub trait NeighborTransmitter {
    fn start(&mut self, id_pattern: u16, mask: u16);
}

/// A neighbor key outside `[0, NUM_MASTER_ID)`, used to mean "no key has
/// been chosen yet" at boot.
const INVALID_KEY: u8 = u8::MAX;

/// Chooses and periodically rotates the 3-bit neighbor key that selects
/// both the short-range beacon identity and the pairing channel.
pub struct NeighborKeyRotator {
    key: u8,
}

impl NeighborKeyRotator {
    pub fn new() -> Self {
        Self { key: INVALID_KEY }
    }

    pub fn key(&self) -> Option<u8> {
        if self.key < NUM_MASTER_ID as u8 {
            Some(self.key)
        } else {
            None
        }
    }

    /// Start the beacon for `k` and retune the pairing channel to match.
    /// These always happen together.
    pub fn set_neighbor_key<N: NeighborTransmitter>(
        &mut self,
        k: u8,
        neighbor_tx: &mut N,
        config: &Config,
        pairing_addr: &mut RadioAddress,
    ) {
        debug_assert!((k as usize) < NUM_MASTER_ID);
        self.key = k;

        let id_byte = FIRST_MASTER_ID.wrapping_add(k);
        let pattern = ((id_byte as u16) << 8) | (((!id_byte) << 3) as u16 & 0xff);
        neighbor_tx.start(pattern, 0xffff);

        pairing_addr.channel = config.pairing_channels[k as usize];
    }

    /// Choose a new key uniformly at random, excluding the current key
    /// (if one has been chosen), and apply it.
    pub fn next_neighbor_key<E: Entropy, N: NeighborTransmitter>(
        &mut self,
        prng: &mut E,
        neighbor_tx: &mut N,
        config: &Config,
        pairing_addr: &mut RadioAddress,
    ) {
        prng.collect_timing_entropy();

        let new_key = match self.key() {
            Some(current) => {
                let r = prng.value_bounded(NUM_MASTER_ID as u32 - 1) as u8;
                if r >= current { r + 1 } else { r }
            }
            None => prng.value_bounded(NUM_MASTER_ID as u32 - 1) as u8,
        };

        self.set_neighbor_key(new_key, neighbor_tx, config, pairing_addr);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entropy::mock::MockEntropy;

    struct MockNeighborTx {
        last_pattern: Option<u16>,
    }

    impl MockNeighborTx {
        fn new() -> Self {
            Self { last_pattern: None }
        }
    }

    impl NeighborTransmitter for MockNeighborTx {
        fn start(&mut self, id_pattern: u16, _mask: u16) {
            self.last_pattern = Some(id_pattern);
        }
    }

    #[test]
    fn boot_time_key_is_invalid_until_chosen() {
        let rotator = NeighborKeyRotator::new();
        assert_eq!(rotator.key(), None);
    }

    #[test]
    fn set_neighbor_key_retunes_pairing_channel() {
        let mut rotator = NeighborKeyRotator::new();
        let mut tx = MockNeighborTx::new();
        let config = Config::default();
        let mut pairing_addr = RadioAddress::default();

        rotator.set_neighbor_key(3, &mut tx, &config, &mut pairing_addr);

        assert_eq!(rotator.key(), Some(3));
        assert_eq!(pairing_addr.channel, config.pairing_channels[3]);
        assert!(tx.last_pattern.is_some());
    }

    #[test]
    fn consecutive_next_keys_never_repeat() {
        let mut rotator = NeighborKeyRotator::new();
        let mut tx = MockNeighborTx::new();
        let config = Config::default();
        let mut pairing_addr = RadioAddress::default();
        let mut prng = MockEntropy::new(1);

        rotator.next_neighbor_key(&mut prng, &mut tx, &config, &mut pairing_addr);
        let mut prev = rotator.key().unwrap();

        for _ in 0..50 {
            rotator.next_neighbor_key(&mut prng, &mut tx, &config, &mut pairing_addr);
            let next = rotator.key().unwrap();
            assert_ne!(next, prev, "key repeated across an adjacent pair of calls");
            prev = next;
        }
    }

    #[test]
    fn every_key_including_the_last_is_reachable() {
        let mut rotator = NeighborKeyRotator::new();
        let mut tx = MockNeighborTx::new();
        let config = Config::default();
        let mut pairing_addr = RadioAddress::default();
        let mut prng = MockEntropy::new(7);

        let mut seen = [false; NUM_MASTER_ID];
        for _ in 0..500 {
            rotator.next_neighbor_key(&mut prng, &mut tx, &config, &mut pairing_addr);
            seen[rotator.key().unwrap() as usize] = true;
        }

        assert!(seen.iter().all(|&s| s), "some neighbor key was never produced: {:?}", seen);
    }
}

//! Radio addresses and the factory that mints them.

use crate::config::{ADDR_ID_LEN, FORBIDDEN_ID_BYTES};
use crate::entropy::Entropy;
use crate::hwid::Hwid;

/// A channel index plus a 5-byte identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioAddress {
    pub channel: u8,
    pub id: [u8; ADDR_ID_LEN],
}

impl RadioAddress {
    pub const fn new(channel: u8, id: [u8; ADDR_ID_LEN]) -> Self {
        Self { channel, id }
    }
}

fn is_forbidden(byte: u8) -> bool {
    FORBIDDEN_ID_BYTES.contains(&byte)
}

/// Mints radio addresses for the three roles the connector needs: a fresh
/// random connection address, a deterministic reconnect address derived
/// from a stored HWID, and the primary/alternate channel toggle used while
/// paging a sleeping, previously-paired cube.
pub struct AddressFactory;

impl AddressFactory {
    /// Draw a fully random address: every identifier byte individually
    /// resampled until it avoids the forbidden set, channel uniform over
    /// the full radio channel range.
    pub fn random<E: Entropy>(prng: &mut E, channel_count: u32) -> RadioAddress {
        let mut id = [0u8; ADDR_ID_LEN];
        for byte in id.iter_mut() {
            loop {
                let candidate = (prng.next_u32() & 0xff) as u8;
                if !is_forbidden(candidate) {
                    *byte = candidate;
                    break;
                }
            }
        }

        let channel = prng.value_bounded(channel_count) as u8;

        RadioAddress { channel, id }
    }

    /// Deterministically derive a reconnect address from a stored HWID.
    ///
    /// The mapping only needs to be stable and well-distributed across the
    /// channel/identifier space; it is not a security boundary (pairing is
    /// explicitly cleartext).
    pub fn from_hardware_id(hwid: Hwid, channel_count: u32) -> RadioAddress {
        let v = hwid.as_u64();

        let mut id = [0u8; ADDR_ID_LEN];
        let mut acc = v;
        for byte in id.iter_mut() {
            let mut candidate = (acc & 0xff) as u8;
            // HWID bytes can themselves land on a forbidden pattern; fold
            // in a fixed odd constant until they don't, keeping the
            // mapping a pure function of the HWID.
            while is_forbidden(candidate) {
                candidate = candidate.wrapping_add(0x31);
            }
            *byte = candidate;
            acc = acc.rotate_right(8) ^ 0x9e37_79b9_7f4a_7c15;
        }

        let channel = (v % channel_count as u64) as u8;

        RadioAddress { channel, id }
    }

    /// Toggle between the primary and alternate channel for the same
    /// identifier, used when an initial reconnect attempt times out.
    pub fn channel_toggle(addr: &mut RadioAddress, channel_count: u32) {
        let half = channel_count / 2;
        addr.channel = ((addr.channel as u32 + half) % channel_count) as u8;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entropy::mock::MockEntropy;

    #[test]
    fn random_addresses_avoid_forbidden_bytes() {
        let mut prng = MockEntropy::new(42);
        for _ in 0..200 {
            let addr = AddressFactory::random(&mut prng, 64);
            for b in addr.id.iter() {
                assert!(!is_forbidden(*b), "forbidden byte {:#x} in random address", b);
            }
            assert!((addr.channel as u32) < 64);
        }
    }

    #[test]
    fn from_hardware_id_is_deterministic() {
        let hwid = Hwid::from_u64(0x1122_3344_5566_7788);
        let a = AddressFactory::from_hardware_id(hwid, 64);
        let b = AddressFactory::from_hardware_id(hwid, 64);
        assert_eq!(a, b);
        for byte in a.id.iter() {
            assert!(!is_forbidden(*byte));
        }
    }

    #[test]
    fn channel_toggle_is_involutive() {
        let mut addr = RadioAddress::new(5, [1, 2, 3, 4, 5]);
        let original = addr.channel;
        AddressFactory::channel_toggle(&mut addr, 64);
        assert_ne!(addr.channel, original);
        AddressFactory::channel_toggle(&mut addr, 64);
        assert_eq!(addr.channel, original);
    }
}

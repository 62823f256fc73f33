//! The 8-byte hardware identifier a peripheral reports in its ack payload.

use crate::config::HWID_LEN;

/// A peripheral's hardware identifier, as reported in an ack payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hwid(pub [u8; HWID_LEN]);

impl Hwid {
    /// Sentinel value marking an unused pairing slot.
    ///
    /// All-ones is never a legitimately-assigned hardware ID, since real
    /// IDs are drawn from manufacturer-assigned address space.
    pub const INVALID: Hwid = Hwid([0xff; HWID_LEN]);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    pub fn from_u64(v: u64) -> Self {
        Hwid(v.to_le_bytes())
    }

    /// Parse a HWID from the front of an ack payload, if long enough.
    pub fn from_ack_payload(payload: &[u8]) -> Option<Hwid> {
        if payload.len() < HWID_LEN {
            return None;
        }
        let mut bytes = [0u8; HWID_LEN];
        bytes.copy_from_slice(&payload[..HWID_LEN]);
        Some(Hwid(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_is_not_valid() {
        assert!(!Hwid::INVALID.is_valid());
    }

    #[test]
    fn roundtrip_u64() {
        let h = Hwid::from_u64(0x0102_0304_0506_0708);
        assert!(h.is_valid());
        assert_eq!(h.as_u64(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn short_payload_has_no_hwid() {
        assert_eq!(Hwid::from_ack_payload(&[1, 2, 3]), None);
    }

    #[test]
    fn long_enough_payload_parses() {
        let payload = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(Hwid::from_ack_payload(&payload), Some(Hwid([1, 2, 3, 4, 5, 6, 7, 8])));
    }
}

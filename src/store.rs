//! Persistent-storage contract consumed by the pairing store and the
//! deferred task dispatcher. The filesystem itself (flash wear-levelling,
//! key/value layout) is an external collaborator; this crate only needs
//! load/write-by-key and per-cube delete.

use crate::pairing::{PairingIdRecord, PairingMruRecord};

/// A record persisted to flash failed to load or write.
///
/// The connector never treats this as fatal (§7): the deferred task logs
/// it and moves on, leaving the record dirty for a later retry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoreError;

/// Load/write of the two pairing records by well-known key, plus per-cube
/// record deletion keyed as `kCubeBase + slot`.
pub trait PersistentStore<const N: usize> {
    fn load_pairing_id(&mut self) -> Result<PairingIdRecord<N>, StoreError>;
    fn write_pairing_id(&mut self, record: &PairingIdRecord<N>) -> Result<(), StoreError>;

    fn load_pairing_mru(&mut self) -> Result<PairingMruRecord<N>, StoreError>;
    fn write_pairing_mru(&mut self, record: &PairingMruRecord<N>) -> Result<(), StoreError>;

    /// Delete the per-cube pairing record at `kCubeBase + slot`.
    fn delete_cube(&mut self, slot: usize) -> Result<(), StoreError>;
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use super::*;

    /// An in-memory store, for tests and host-side simulation.
    pub struct MockStore<const N: usize> {
        pub id: PairingIdRecord<N>,
        pub mru: PairingMruRecord<N>,
        pub deleted: heapless::Vec<usize, 32>,
        pub fail_next_write: bool,
    }

    impl<const N: usize> MockStore<N> {
        pub fn new() -> Self {
            Self {
                id: PairingIdRecord::empty(),
                mru: PairingMruRecord::identity(),
                deleted: heapless::Vec::new(),
                fail_next_write: false,
            }
        }
    }

    impl<const N: usize> PersistentStore<N> for MockStore<N> {
        fn load_pairing_id(&mut self) -> Result<PairingIdRecord<N>, StoreError> {
            Ok(self.id)
        }

        fn write_pairing_id(&mut self, record: &PairingIdRecord<N>) -> Result<(), StoreError> {
            if self.fail_next_write {
                self.fail_next_write = false;
                return Err(StoreError);
            }
            self.id = *record;
            Ok(())
        }

        fn load_pairing_mru(&mut self) -> Result<PairingMruRecord<N>, StoreError> {
            Ok(self.mru)
        }

        fn write_pairing_mru(&mut self, record: &PairingMruRecord<N>) -> Result<(), StoreError> {
            if self.fail_next_write {
                self.fail_next_write = false;
                return Err(StoreError);
            }
            self.mru = *record;
            Ok(())
        }

        fn delete_cube(&mut self, slot: usize) -> Result<(), StoreError> {
            let _ = self.deleted.push(slot);
            Ok(())
        }
    }
}

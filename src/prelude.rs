pub use crate::address::{AddressFactory, RadioAddress};

pub use crate::config::Config;

pub use crate::connector::{Connector, TxState};

pub use crate::cubeslots::CubeSlots;

pub use crate::entropy::Entropy;

pub use crate::hwid::Hwid;

pub use crate::neighbor::{NeighborKeyRotator, NeighborTransmitter};

pub use crate::packet::{AckPacket, Transmission, TxPacket};

pub use crate::pairing::{PairingIdRecord, PairingKey, PairingMruRecord, PairingStore};

pub use crate::store::{PersistentStore, StoreError};

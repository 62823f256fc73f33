//! The `CubeConnector` state machine: discovers physically-neighbored
//! cubes, verifies them via the neighbor side channel, pairs them, and
//! reconnects previously-paired cubes, handing each live connection off to
//! a cube-slot runtime.

use heapless::spsc::Queue;
use log::{debug, trace, warn};

use crate::address::{AddressFactory, RadioAddress};
use crate::bitset::AtomicBitset32;
use crate::config::Config;
use crate::cubeslots::{lowest_available_slot, CubeSlots};
use crate::entropy::Entropy;
use crate::hwid::Hwid;
use crate::neighbor::{NeighborKeyRotator, NeighborTransmitter};
use crate::pairing::{PairingIdRecord, PairingKey, PairingMruRecord, PairingStore};
use crate::packet::{AckPacket, Transmission, TxPacket};
use crate::reconnect::ReconnectQueue;
use crate::store::PersistentStore;
use crate::task::{self, TaskWork, WorkItem};

/// The driven transmit state. `PairingVerify` carries its 0-indexed stage
/// within `PairingFirstVerify..PairingFinalVerify`; every other state is a
/// plain unit variant. `advance_verify` is the explicit stand-in for the
/// original protocol's `txState = packetRxState + 1` arithmetic across
/// that contiguous range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxState {
    PairingFirstContact,
    PairingVerify(u8),
    PairingBeginHop,
    ReconnectFirstContact,
    ReconnectAltFirstContact,
    ReconnectBeginHop,
    HopConfirm,
}

impl TxState {
    /// Advance a verify stage by one, rolling over into `PairingBeginHop`
    /// once the final verify stage has succeeded.
    fn advance_verify(stage: u8, verify_stages: u8) -> TxState {
        let next = stage + 1;
        if next < verify_stages {
            TxState::PairingVerify(next)
        } else {
            TxState::PairingBeginHop
        }
    }
}

/// The `CubeConnector` state machine.
///
/// Generic over its four collaborators (cube-slot runtime, persistent
/// store, neighbor-beacon transmitter, and an entropy source) and over two
/// compile-time sizes: `N` is `NUM_PAIRINGS`, `F` is the radio's
/// outstanding-packet FIFO depth.
pub struct Connector<S, P, Nt, E, const N: usize, const F: usize> {
    cube_slots: S,
    store: P,
    neighbor_tx: Nt,
    prng: E,

    config: Config,

    pairing_addr: RadioAddress,
    connection_addr: RadioAddress,
    reconnect_addr: RadioAddress,

    rx_state: Queue<TxState, F>,

    pairing_store: PairingStore<N>,
    reconnect_queue: ReconnectQueue,
    recycle_queue: AtomicBitset32,
    task_work: TaskWork,

    neighbor: NeighborKeyRotator,

    tx_state: TxState,
    pairing_packet_counter: u8,
    hwid: Hwid,
    cube_id: usize,
    pairing_key: PairingKey,
}

impl<S, P, Nt, E, const N: usize, const F: usize> Connector<S, P, Nt, E, N, F>
where
    S: CubeSlots,
    P: PersistentStore<N>,
    Nt: NeighborTransmitter,
    E: Entropy,
{
    /// Boot-time initialization: load persisted pairing records (falling
    /// back to an empty table on a load failure rather than refusing to
    /// start) and choose an initial neighbor key.
    pub fn init(cube_slots: S, mut store: P, mut neighbor_tx: Nt, mut prng: E, config: Config) -> Self {
        let id = store.load_pairing_id().unwrap_or_else(|_| {
            warn!("failed to load pairing id record, starting from empty table");
            PairingIdRecord::empty()
        });
        let mru = store.load_pairing_mru().unwrap_or_else(|_| {
            warn!("failed to load pairing mru record, starting from identity order");
            PairingMruRecord::identity()
        });

        let mut pairing_addr = RadioAddress::new(config.pairing_channels[0], [0, 0, 0, 0, 0]);
        let mut neighbor = NeighborKeyRotator::new();
        neighbor.next_neighbor_key(&mut prng, &mut neighbor_tx, &config, &mut pairing_addr);

        Self {
            cube_slots,
            store,
            neighbor_tx,
            prng,
            config,

            pairing_addr,
            connection_addr: RadioAddress::default(),
            reconnect_addr: RadioAddress::default(),

            rx_state: Queue::new(),

            pairing_store: PairingStore::new(id, mru),
            reconnect_queue: ReconnectQueue::new(),
            recycle_queue: AtomicBitset32::new(),
            task_work: TaskWork::new(),

            neighbor,

            tx_state: TxState::PairingFirstContact,
            pairing_packet_counter: 0,
            hwid: Hwid::INVALID,
            cube_id: 0,
            pairing_key: 0,
        }
    }

    /// Radio-layer entry point: fill in the next packet to transmit.
    pub fn produce(&mut self) -> Transmission {
        trace!("produce from {:?}", self.tx_state);
        self.produce_for(self.tx_state)
    }

    fn produce_for(&mut self, state: TxState) -> Transmission {
        match state {
            TxState::PairingFirstContact => {
                self.reconnect_queue.refill(&self.cube_slots, &self.pairing_store.id);

                // Post-increment semantics: rotate when the *old* counter was
                // zero, so the very first produce() after boot (or after a
                // wraparound) also rotates the neighbor key.
                let rotate = self.pairing_packet_counter == 0;
                self.pairing_packet_counter = self.pairing_packet_counter.wrapping_add(1);
                if rotate {
                    self.rotate_neighbor_key();
                }

                self.enqueue(TxState::PairingFirstContact);
                Transmission {
                    dest: self.pairing_addr,
                    packet: TxPacket::ping(),
                    num_software_retries: 0,
                    num_hardware_retries: 0,
                }
            }

            TxState::ReconnectFirstContact => {
                match self.reconnect_queue.pop(&self.pairing_store.id, self.config.channel_count) {
                    Some(candidate) => {
                        self.hwid = candidate.hwid;
                        self.reconnect_addr = candidate.addr;
                        self.pairing_key = candidate.pairing_key;

                        self.enqueue(TxState::ReconnectFirstContact);
                        Transmission {
                            dest: self.reconnect_addr,
                            packet: TxPacket::ping(),
                            num_software_retries: 0,
                            num_hardware_retries: 0,
                        }
                    }
                    None => self.produce_for(TxState::PairingFirstContact),
                }
            }

            TxState::ReconnectAltFirstContact => {
                AddressFactory::channel_toggle(&mut self.reconnect_addr, self.config.channel_count);

                self.enqueue(state);
                Transmission {
                    dest: self.reconnect_addr,
                    packet: TxPacket::ping(),
                    num_software_retries: self.config.default_software_retries,
                    num_hardware_retries: self.config.default_hardware_retries,
                }
            }

            TxState::PairingVerify(_) => {
                self.enqueue(state);
                Transmission {
                    dest: self.pairing_addr,
                    packet: TxPacket::ping(),
                    num_software_retries: self.config.default_software_retries,
                    num_hardware_retries: self.config.default_hardware_retries,
                }
            }

            TxState::PairingBeginHop => {
                self.pairing_key = self.pairing_store.new_cube_record(
                    &self.cube_slots,
                    self.hwid,
                    &self.recycle_queue,
                    &self.task_work,
                );

                if self.choose_connection_addr() {
                    self.enqueue(TxState::PairingBeginHop);
                    Transmission {
                        dest: self.pairing_addr,
                        packet: TxPacket::hop(&self.connection_addr, self.cube_id as u8),
                        num_software_retries: self.config.default_software_retries,
                        num_hardware_retries: self.config.default_hardware_retries,
                    }
                } else {
                    self.produce_for(TxState::PairingFirstContact)
                }
            }

            TxState::ReconnectBeginHop => {
                if self.choose_connection_addr() {
                    self.enqueue(TxState::ReconnectBeginHop);
                    Transmission {
                        dest: self.reconnect_addr,
                        packet: TxPacket::hop(&self.connection_addr, self.cube_id as u8),
                        num_software_retries: self.config.default_software_retries,
                        num_hardware_retries: self.config.default_hardware_retries,
                    }
                } else {
                    self.produce_for(TxState::ReconnectFirstContact)
                }
            }

            TxState::HopConfirm => {
                self.enqueue(TxState::HopConfirm);
                Transmission {
                    dest: self.connection_addr,
                    packet: TxPacket::explicit_full_ack_request(),
                    num_software_retries: self.config.default_software_retries,
                    num_hardware_retries: self.config.default_hardware_retries,
                }
            }
        }
    }

    fn enqueue(&mut self, state: TxState) {
        if self.rx_state.enqueue(state).is_err() {
            warn!("rxState FIFO full, dropping in-flight record (radio outpaced our FIFO depth)");
        }
    }

    fn rotate_neighbor_key(&mut self) {
        self.neighbor.next_neighbor_key(
            &mut self.prng,
            &mut self.neighbor_tx,
            &self.config,
            &mut self.pairing_addr,
        );
    }

    fn choose_connection_addr(&mut self) -> bool {
        self.prng.collect_timing_entropy();
        self.connection_addr = AddressFactory::random(&mut self.prng, self.config.channel_count);

        match lowest_available_slot(self.cube_slots.available_slots()) {
            Some(id) => {
                self.cube_id = id;
                true
            }
            None => false,
        }
    }

    /// Radio-layer entry point: a hardware ack carrying a payload.
    pub fn acknowledge(&mut self, packet: &[u8]) {
        let ack = AckPacket::parse(packet);
        let packet_rx_state = match self.rx_state.dequeue() {
            Some(s) => s,
            None => {
                warn!("acknowledge() with no in-flight packet on record");
                return;
            }
        };

        match packet_rx_state {
            TxState::PairingFirstContact => {
                self.rotate_neighbor_key();
                if let Some(hwid) = ack.hwid {
                    self.hwid = hwid;
                    self.tx_state = if self.config.verify_stages == 0 {
                        TxState::PairingBeginHop
                    } else {
                        TxState::PairingVerify(0)
                    };
                }
                // Missing HWID: stay put, no advance.
            }

            TxState::PairingVerify(stage) => {
                self.rotate_neighbor_key();
                if ack.hwid == Some(self.hwid) {
                    self.tx_state = TxState::advance_verify(stage, self.config.verify_stages);
                } else {
                    self.tx_state = TxState::PairingFirstContact;
                }
            }

            TxState::ReconnectFirstContact | TxState::ReconnectAltFirstContact => {
                if ack.hwid == Some(self.hwid) {
                    self.tx_state = TxState::ReconnectBeginHop;
                }
            }

            TxState::PairingBeginHop | TxState::ReconnectBeginHop => {
                self.tx_state = TxState::HopConfirm;
            }

            TxState::HopConfirm => {
                if ack.hwid == Some(self.hwid) {
                    if self.pairing_store.mru.access(self.pairing_key) {
                        self.task_work.atomic_mark(WorkItem::SavePairingMru);
                    }

                    if self.cube_slots.is_slot_available(self.cube_id) {
                        debug!("handing off cube {} (key {}) to its slot", self.cube_id, self.pairing_key);
                        self.cube_slots.connect(self.cube_id, self.pairing_key, self.connection_addr, &ack);
                    }
                }
                self.tx_state = TxState::PairingFirstContact;
            }
        }
    }

    /// Radio-layer entry point: the hardware ack carried no payload.
    ///
    /// A disconnected peripheral always includes its HWID, so an
    /// empty ack tells us nothing; just retire the in-flight record.
    pub fn empty_acknowledge(&mut self) {
        if self.rx_state.dequeue().is_none() {
            warn!("empty_acknowledge() with no in-flight packet on record");
        }
    }

    /// Radio-layer entry point: no ack arrived within budget.
    pub fn timeout(&mut self) {
        let packet_rx_state = match self.rx_state.dequeue() {
            Some(s) => s,
            None => {
                warn!("timeout() with no in-flight packet on record");
                return;
            }
        };

        self.tx_state = match packet_rx_state {
            TxState::PairingBeginHop | TxState::ReconnectBeginHop => TxState::HopConfirm,
            TxState::ReconnectFirstContact => TxState::ReconnectAltFirstContact,
            _ => TxState::ReconnectFirstContact,
        };
    }

    /// Deferred-task entry point: persist dirty records and recycle
    /// pairing slots queued for deletion. Run from a non-interrupt task
    /// context whenever woken.
    pub fn task(&mut self) {
        task::run_deferred_task(
            &self.task_work,
            &self.recycle_queue,
            &self.pairing_store.id,
            &self.pairing_store.mru,
            &mut self.store,
        );
    }

    pub fn tx_state(&self) -> TxState {
        self.tx_state
    }
}

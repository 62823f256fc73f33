//! Wire-level packet formats exchanged with a cube during pairing and
//! reconnection. These are tiny, fixed-layout frames; there's no benefit to
//! a general encode/decode trait here the way a full 802.15.4 frame needs
//! one.

use crate::address::RadioAddress;
use crate::config::{
    HOP_DIRECTIVE_CUBE_ID_BASE, HOP_DIRECTIVE_PREFIX, HWID_LEN, PACKET_EXPLICIT_ACK_REQUEST,
    PACKET_PING,
};
use crate::hwid::Hwid;

/// Outbound packet a `produce()` call fills in.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxPacket {
    pub len: usize,
    pub bytes: [u8; 8],
}

impl TxPacket {
    pub fn ping() -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = PACKET_PING;
        Self { len: 1, bytes }
    }

    pub fn explicit_full_ack_request() -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = PACKET_EXPLICIT_ACK_REQUEST;
        Self { len: 1, bytes }
    }

    /// Build an 8-byte radio hop directive pointing a cube at `dest` /
    /// `cube_id`: `[0x7a, channel, id[0..5], 0xe0 | cube_id]`.
    pub fn hop(dest: &RadioAddress, cube_id: u8) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = HOP_DIRECTIVE_PREFIX;
        bytes[1] = dest.channel;
        bytes[2..7].copy_from_slice(&dest.id);
        bytes[7] = HOP_DIRECTIVE_CUBE_ID_BASE | cube_id;
        Self { len: 8, bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Transmission parameters accompanying a produced packet.
#[derive(Clone, Debug, PartialEq)]
pub struct Transmission {
    pub dest: RadioAddress,
    pub packet: TxPacket,
    pub num_software_retries: u8,
    pub num_hardware_retries: u8,
}

/// Ack payload received from a cube, with or without a carried HWID.
#[derive(Clone, Debug, PartialEq)]
pub struct AckPacket {
    pub hwid: Option<Hwid>,
    /// Remaining bytes once the HWID (if any) has been stripped off.
    pub payload: heapless::Vec<u8, 24>,
}

impl AckPacket {
    /// Parse an ack buffer: the first `HWID_LEN` bytes are a HWID if the
    /// buffer is at least that long, per the wire contract.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.len() < HWID_LEN {
            return Self { hwid: None, payload: heapless::Vec::new() };
        }

        let hwid = Hwid::from_ack_payload(bytes);
        let mut payload = heapless::Vec::new();
        let _ = payload.extend_from_slice(&bytes[HWID_LEN..]);
        Self { hwid, payload }
    }
}

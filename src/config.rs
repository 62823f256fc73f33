//! Protocol constants and tunables for the cube connector.

/// Number of distinct neighbor/master keys (and thus pairing channels).
pub const NUM_MASTER_ID: usize = 8;

/// First neighbor-beacon ID byte; actual IDs are `FIRST_MASTER_ID + key`.
pub const FIRST_MASTER_ID: u8 = 0xf0;

/// Length of a hardware ID, in bytes.
pub const HWID_LEN: usize = 8;

/// Length of a radio address identifier, in bytes.
pub const ADDR_ID_LEN: usize = 5;

/// Identifier byte values that must never appear in a radio address, since
/// they correspond to degenerate bit patterns on the air (all-zero,
/// all-one, and the two alternating patterns).
pub const FORBIDDEN_ID_BYTES: [u8; 4] = [0x00, 0x55, 0xaa, 0xff];

/// Ping packet: a 1-byte first-contact / verify probe.
pub const PACKET_PING: u8 = 0xff;

/// Explicit Full ACK request, sent while confirming a hop.
pub const PACKET_EXPLICIT_ACK_REQUEST: u8 = 0x79;

/// Leading byte of a radio hop directive.
pub const HOP_DIRECTIVE_PREFIX: u8 = 0x7a;

/// High nibble OR'd into the cube ID byte of a hop directive.
pub const HOP_DIRECTIVE_CUBE_ID_BASE: u8 = 0xe0;

/// Tunable knobs for the connector. Mirrors the role of `CoreConfig` in a
/// typical MAC layer: nothing here changes protocol semantics, only the
/// retry/timeout budget the radio layer is asked to use.
///
/// `PairingFirstContact` and `ReconnectFirstContact` always request zero
/// retries (a lost first-contact ping just means nobody answered; we'll try
/// again next round) so that isn't configurable. Every other produced
/// packet uses `default_hardware_retries` / `default_software_retries`.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Per-key pairing channel table, indexed by neighbor key.
    pub pairing_channels: [u8; NUM_MASTER_ID],

    /// Hardware retries requested for every packet other than the two
    /// first-contact pings.
    pub default_hardware_retries: u8,
    /// Software retries requested for every packet other than the two
    /// first-contact pings.
    pub default_software_retries: u8,

    /// Number of contiguous verify stages between first contact and
    /// beginning a hop (`PairingFirstVerify..PairingFinalVerify`). The
    /// protocol fixes this somewhere in 4-8; it's a build-time choice of
    /// how much confidence to demand before trusting physical co-presence.
    pub verify_stages: u8,

    /// Full radio channel range, used when drawing a random connection
    /// address and when computing a deterministic reconnect address.
    pub channel_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Placeholder 2.4 GHz channel spread; a real board config supplies
            // values tuned to the regulatory domain and radio in use.
            pairing_channels: [2, 22, 42, 62, 9, 29, 49, 69],

            default_hardware_retries: 15,
            default_software_retries: 0,

            verify_stages: 4,
            channel_count: 64,
        }
    }
}

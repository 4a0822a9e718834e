//! Header constants for host server data streams.
//!
//! Server IDs occupy header offset 6; every ID starts with the sentinel
//! byte 0xE0. Request/reply IDs occupy offset 18.

// ── Header layout ────────────────────────────────────────
/// Fixed header length.
pub const HEADER_LENGTH: usize = 20;
/// Required value of header byte 6 (high byte of every server ID).
pub const HEADER_SENTINEL: u8 = 0xE0;

pub(crate) const OFFSET_LENGTH: usize = 0;
pub(crate) const OFFSET_HEADER_ID: usize = 4;
pub(crate) const OFFSET_SERVER_ID: usize = 6;
pub(crate) const OFFSET_CS_INSTANCE: usize = 8;
pub(crate) const OFFSET_CORRELATION: usize = 12;
pub(crate) const OFFSET_TEMPLATE_LEN: usize = 16;
pub(crate) const OFFSET_REQ_REP_ID: usize = 18;

// ── Server IDs ───────────────────────────────────────────
/// Host server identifiers.
pub struct ServerId;

impl ServerId {
    /// Central server (licensing, conversion maps).
    pub const CENTRAL: u16 = 0xE000;
    /// Integrated file system server.
    pub const FILE: u16 = 0xE002;
    /// Network print server.
    pub const PRINT: u16 = 0xE003;
    /// Database server.
    pub const DATABASE: u16 = 0xE004;
    /// Data queue server.
    pub const DATA_QUEUE: u16 = 0xE007;
    /// Remote command and program call server.
    pub const REMOTE_COMMAND: u16 = 0xE008;
    /// Sign-on server.
    pub const SIGNON: u16 = 0xE009;

    /// Human-readable server name, if `id` is a known server.
    pub fn name(id: u16) -> Option<&'static str> {
        let name = match id {
            Self::CENTRAL => "central",
            Self::FILE => "file",
            Self::PRINT => "print",
            Self::DATABASE => "database",
            Self::DATA_QUEUE => "data-queue",
            Self::REMOTE_COMMAND => "remote-command",
            Self::SIGNON => "signon",
            _ => return None,
        };
        Some(name)
    }
}

// ── Connection setup ─────────────────────────────────────
/// Exchange random seeds request (client→server).
pub const EXCHANGE_SEED_REQUEST: u16 = 0x7001;
/// Exchange random seeds reply (server→client).
pub const EXCHANGE_SEED_REPLY: u16 = 0xF001;
/// Start server request (client→server).
pub const START_SERVER_REQUEST: u16 = 0x7002;
/// Start server reply (server→client).
pub const START_SERVER_REPLY: u16 = 0xF002;

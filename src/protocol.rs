//! Wire format of the inexio serial touchscreen.
//!
//! Every report is 5 bytes:
//! - STATUS (1 byte): 0x81 while touched, 0x80 when the touch is released
//! - X HIGH (1 byte): upper 7 bits of X
//! - X LOW (1 byte): lower 7 bits of X
//! - Y HIGH (1 byte): upper 7 bits of Y
//! - Y LOW (1 byte): lower 7 bits of Y
//!
//! Only the status byte has its top bit set, which is what the framer
//! resynchronizes on.

/// Length of a complete report
pub const PACKET_LEN: usize = 5;

/// Top bit marking a status byte
pub const STATUS_MARKER: u8 = 0x80;

/// Status byte of a touch-up report
pub const STATUS_UP: u8 = 0x80;

/// Status byte of a touch-down report
pub const STATUS_DOWN: u8 = 0x81;

/// Smallest coordinate the controller reports
pub const COORD_MIN: i32 = 0x0000;

/// Largest coordinate the controller reports (14 bits)
pub const COORD_MAX: i32 = 0x3FFF;

const SEVEN_BITS: u8 = 0x7F;

/// A complete report as it came off the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    pub fn new(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a report for the given state and coordinates.
    ///
    /// Coordinates outside the 14-bit range are truncated to it.
    pub fn from_position(is_down: bool, x: i32, y: i32) -> Self {
        let status = if is_down { STATUS_DOWN } else { STATUS_UP };
        let (x_high, x_low) = split(x);
        let (y_high, y_low) = split(y);
        Self([status, x_high, x_low, y_high, y_low])
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    pub fn status(&self) -> u8 {
        self.0[0]
    }

    /// Bit 0 of the status byte tells down (1) from up (0)
    pub fn is_down(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn raw_x(&self) -> i32 {
        join(self.0[1], self.0[2])
    }

    pub fn raw_y(&self) -> i32 {
        join(self.0[3], self.0[4])
    }
}

fn join(high: u8, low: u8) -> i32 {
    ((i32::from(high & SEVEN_BITS)) << 7) + i32::from(low & SEVEN_BITS)
}

fn split(value: i32) -> (u8, u8) {
    let value = value.clamp(COORD_MIN, COORD_MAX);
    (((value >> 7) as u8) & SEVEN_BITS, (value as u8) & SEVEN_BITS)
}

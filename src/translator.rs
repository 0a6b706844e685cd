use crate::calibration::Calibration;
use crate::event::{ButtonEvent, MotionEvent};
use crate::protocol::Packet;
use tracing::trace;

/// What the host last heard about the touch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchState {
    pub button_down: bool,
    /// Raw position of the most recent touch-down report
    pub last_x: i32,
    pub last_y: i32,
}

/// Events produced by one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchReport {
    pub motion: MotionEvent,
    /// Present only when the touch state flipped
    pub button: Option<ButtonEvent>,
}

/// Decodes packets into host events
#[derive(Debug, Clone)]
pub struct Translator {
    calibration: Calibration,
    button: u32,
    state: TouchState,
}

impl Translator {
    pub fn new(calibration: Calibration, button: u32) -> Self {
        Self {
            calibration,
            button,
            state: TouchState::default(),
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Swap in new calibration; the touch state is kept
    pub fn reconfigure(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn state(&self) -> &TouchState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = TouchState::default();
    }

    pub fn translate(&mut self, packet: &Packet) -> TouchReport {
        let is_down = packet.is_down();

        // Lift reports carry junk coordinates, so release where the last touch was
        if is_down {
            self.state.last_x = packet.raw_x();
            self.state.last_y = packet.raw_y();
        }

        let (x, y) = self
            .calibration
            .apply(self.state.last_x, self.state.last_y);
        let motion = MotionEvent::absolute(x, y);

        let button = if self.state.button_down != is_down {
            self.state.button_down = is_down;
            Some(ButtonEvent::absolute(self.button, is_down, x, y))
        } else {
            None
        };

        trace!(
            "Packet {:02x?} -> ({}, {}) down={} edge={}",
            packet.as_bytes(),
            x,
            y,
            is_down,
            button.is_some()
        );

        TouchReport { motion, button }
    }
}

//! inexio - serial touchscreen driver
//!
//! Frames the controller's 5-byte reports out of the serial byte stream,
//! translates them into absolute pointer and button events, and hands those
//! to an [`EventSink`] such as a uinput virtual device.

pub mod calibration;
pub mod config;
pub mod device;
pub mod event;
pub mod framer;
pub mod pipeline;
pub mod protocol;
pub mod serial;
pub mod translator;
pub mod uinput;

#[cfg(test)]
mod test_log;

// Re-export commonly used types
pub use calibration::{Calibration, ReportingMode};
pub use config::DriverOptions;
pub use device::{DeviceControl, InexioDevice};
pub use event::{ButtonEvent, EventSink, MotionEvent, RecordedEvent, RecordingSink};
pub use framer::Framer;
pub use pipeline::{DrainStatus, InputPipeline};
pub use protocol::Packet;
pub use translator::{TouchReport, TouchState, Translator};
pub use uinput::UinputSink;

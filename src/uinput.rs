//! Host side: a Linux virtual absolute pointer fed through `/dev/uinput`.

use crate::calibration::Calibration;
use crate::event::{ButtonEvent, EventSink, MotionEvent};
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tracing::{info, trace, warn};

// Uinput constants and structures
pub const UI_SET_EVBIT: u64 = 0x40045564;
pub const UI_SET_KEYBIT: u64 = 0x40045565;
pub const UI_SET_ABSBIT: u64 = 0x40045567;
pub const UI_SET_PROPBIT: u64 = 0x4004556e;
pub const UI_DEV_SETUP: u64 = 0x405c5503;
pub const UI_DEV_CREATE: u64 = 0x5501;
pub const UI_DEV_DESTROY: u64 = 0x5502;
pub const UI_ABS_SETUP: u64 = 0x401c5504;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;
pub const SYN_REPORT: u16 = 0x00;
pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const INPUT_PROP_DIRECT: u16 = 0x01;
pub const BUS_RS232: u16 = 0x13;

pub const UINPUT_PATH: &str = "/dev/uinput";

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct input_id {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

#[repr(C)]
#[derive(Debug)]
pub struct uinput_setup {
    pub id: input_id,
    pub name: [u8; 80],
    pub ff_effects_max: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct input_absinfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

#[repr(C)]
#[derive(Debug)]
pub struct uinput_abs_setup {
    pub code: u16,
    pub absinfo: input_absinfo,
}

/// One `struct input_event` as written to the uinput node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinuxInputEvent {
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

impl LinuxInputEvent {
    pub fn new(type_: u16, code: u16, value: i32) -> Self {
        Self { type_, code, value }
    }

    /// Native layout with a zero timestamp; the kernel stamps the event
    pub fn to_bytes(&self) -> Vec<u8> {
        let time_len = std::mem::size_of::<libc::timeval>();
        let mut bytes = vec![0u8; time_len];
        bytes.extend_from_slice(&self.type_.to_ne_bytes());
        bytes.extend_from_slice(&self.code.to_ne_bytes());
        bytes.extend_from_slice(&self.value.to_ne_bytes());
        bytes
    }
}

/// Map an X-style button number (1 = left, 2 = middle, 3 = right) to a key code
pub fn button_code(button: u32) -> u16 {
    match button {
        0 | 1 => BTN_LEFT,
        2 => BTN_MIDDLE,
        3 => BTN_RIGHT,
        n => BTN_LEFT.saturating_add((n - 1).min(u32::from(u16::MAX)) as u16),
    }
}

fn motion_events(x: i32, y: i32) -> [LinuxInputEvent; 2] {
    [
        LinuxInputEvent::new(EV_ABS, ABS_X, x),
        LinuxInputEvent::new(EV_ABS, ABS_Y, y),
    ]
}

fn encode(events: &[LinuxInputEvent]) -> Vec<u8> {
    let mut data = Vec::new();
    for event in events {
        data.extend_from_slice(&event.to_bytes());
    }
    data
}

/// Build the event sequence for a motion report
pub fn encode_motion(event: &MotionEvent) -> Vec<LinuxInputEvent> {
    let mut events = motion_events(event.x, event.y).to_vec();
    events.push(LinuxInputEvent::new(EV_SYN, SYN_REPORT, 0));
    events
}

/// Build the event sequence for a button transition
pub fn encode_button(event: &ButtonEvent) -> Vec<LinuxInputEvent> {
    let mut events = motion_events(event.x, event.y).to_vec();
    events.push(LinuxInputEvent::new(
        EV_KEY,
        button_code(event.button),
        if event.is_down { 1 } else { 0 },
    ));
    events.push(LinuxInputEvent::new(EV_SYN, SYN_REPORT, 0));
    events
}

/// `UI_ABS_SETUP` payloads advertising the calibration's output ranges
pub fn abs_setups(calibration: &Calibration) -> [uinput_abs_setup; 2] {
    let (x_range, y_range) = calibration.output_ranges();
    [(ABS_X, x_range), (ABS_Y, y_range)].map(|(code, (minimum, maximum))| uinput_abs_setup {
        code,
        absinfo: input_absinfo {
            value: 0,
            minimum,
            maximum,
            fuzz: 0,
            flat: 0,
            resolution: 0,
        },
    })
}

fn ioctl_int(file: &File, request: u64, value: u16) -> io::Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, libc::c_int::from(value)) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ioctl_ptr<T>(file: &File, request: u64, arg: &T) -> io::Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg as *const T) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ioctl_none(file: &File, request: u64) -> io::Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Virtual touchscreen registered with the kernel input subsystem
pub struct UinputSink {
    file: File,
    name: String,
    button: u32,
}

impl UinputSink {
    /// Create the virtual device on `/dev/uinput`
    pub fn create(name: &str, calibration: &Calibration, button: u32) -> anyhow::Result<Self> {
        Self::create_at(Path::new(UINPUT_PATH), name, calibration, button)
    }

    pub fn create_at(
        path: &Path,
        name: &str,
        calibration: &Calibration,
        button: u32,
    ) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Self::setup(&file, name, calibration, button)
            .with_context(|| format!("Failed to set up uinput device {}", name))?;

        info!("Created uinput device '{}'", name);

        Ok(Self {
            file,
            name: name.to_string(),
            button,
        })
    }

    /// Re-create the device so its axis ranges follow `calibration`.
    ///
    /// Absolute ranges are fixed once the kernel device exists, so the old
    /// device is destroyed and set up again on the same uinput handle.
    pub fn reconfigure(&mut self, calibration: &Calibration) -> anyhow::Result<()> {
        ioctl_none(&self.file, UI_DEV_DESTROY)
            .with_context(|| format!("Failed to destroy uinput device {}", self.name))?;
        Self::setup(&self.file, &self.name, calibration, self.button)
            .with_context(|| format!("Failed to set up uinput device {}", self.name))?;

        info!(
            "Re-created uinput device '{}' with ranges {:?}",
            self.name,
            calibration.output_ranges()
        );
        Ok(())
    }

    fn setup(file: &File, name: &str, calibration: &Calibration, button: u32) -> io::Result<()> {
        ioctl_int(file, UI_SET_EVBIT, EV_SYN)?;
        ioctl_int(file, UI_SET_EVBIT, EV_KEY)?;
        ioctl_int(file, UI_SET_EVBIT, EV_ABS)?;
        ioctl_int(file, UI_SET_KEYBIT, button_code(button))?;
        ioctl_int(file, UI_SET_ABSBIT, ABS_X)?;
        ioctl_int(file, UI_SET_ABSBIT, ABS_Y)?;
        ioctl_int(file, UI_SET_PROPBIT, INPUT_PROP_DIRECT)?;

        for abs_setup in abs_setups(calibration) {
            ioctl_ptr(file, UI_ABS_SETUP, &abs_setup)?;
        }

        let mut setup = uinput_setup {
            id: input_id {
                bustype: BUS_RS232,
                vendor: 0,
                product: 0,
                version: 1,
            },
            name: [0; 80],
            ff_effects_max: 0,
        };
        // Keep the trailing NUL
        let name_len = name.len().min(setup.name.len() - 1);
        setup.name[..name_len].copy_from_slice(&name.as_bytes()[..name_len]);
        ioctl_ptr(file, UI_DEV_SETUP, &setup)?;

        ioctl_none(file, UI_DEV_CREATE)
    }

    fn write_events(&mut self, events: &[LinuxInputEvent]) -> anyhow::Result<()> {
        trace!("{}: writing {} events", self.name, events.len());
        self.file
            .write_all(&encode(events))
            .with_context(|| format!("Failed to write events to {}", self.name))
    }
}

impl EventSink for UinputSink {
    fn post_motion(&mut self, event: MotionEvent) -> anyhow::Result<()> {
        self.write_events(&encode_motion(&event))
    }

    fn post_button(&mut self, event: ButtonEvent) -> anyhow::Result<()> {
        self.write_events(&encode_button(&event))
    }
}

impl Drop for UinputSink {
    fn drop(&mut self) {
        if let Err(e) = ioctl_none(&self.file, UI_DEV_DESTROY) {
            warn!("Failed to destroy uinput device {}: {}", self.name, e);
        } else {
            info!("Destroyed uinput device '{}'", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_codes() {
        assert_eq!(button_code(1), BTN_LEFT);
        assert_eq!(button_code(2), BTN_MIDDLE);
        assert_eq!(button_code(3), BTN_RIGHT);
        assert_eq!(button_code(4), BTN_LEFT + 3);
    }

    #[test]
    fn test_event_layout() {
        let bytes = LinuxInputEvent::new(EV_ABS, ABS_Y, -2).to_bytes();
        let time_len = std::mem::size_of::<libc::timeval>();

        assert_eq!(bytes.len(), time_len + 8);
        assert!(bytes[..time_len].iter().all(|&b| b == 0));
        assert_eq!(&bytes[time_len..time_len + 2], &EV_ABS.to_ne_bytes());
        assert_eq!(&bytes[time_len + 2..time_len + 4], &ABS_Y.to_ne_bytes());
        assert_eq!(&bytes[time_len + 4..], &(-2i32).to_ne_bytes());
    }

    #[test]
    fn test_button_sequence_ends_with_sync() {
        let events = encode_button(&ButtonEvent::absolute(1, true, 10, 20));

        assert_eq!(
            events,
            vec![
                LinuxInputEvent::new(EV_ABS, ABS_X, 10),
                LinuxInputEvent::new(EV_ABS, ABS_Y, 20),
                LinuxInputEvent::new(EV_KEY, BTN_LEFT, 1),
                LinuxInputEvent::new(EV_SYN, SYN_REPORT, 0),
            ]
        );
        assert_eq!(encode_motion(&MotionEvent::absolute(3, 4)).len(), 3);
    }

    #[test]
    fn test_abs_ranges_follow_reporting_mode() {
        let scaled = Calibration::default();
        let [x, y] = abs_setups(&scaled);
        assert_eq!((x.code, x.absinfo.minimum, x.absinfo.maximum), (ABS_X, 0, 1920));
        assert_eq!((y.code, y.absinfo.minimum, y.absinfo.maximum), (ABS_Y, 0, 1080));

        let raw = Calibration {
            mode: crate::calibration::ReportingMode::Raw,
            swap_axes: true,
            min_y: 100,
            ..Default::default()
        };
        let [x, y] = abs_setups(&raw);
        assert_eq!((x.absinfo.minimum, x.absinfo.maximum), (100, 0x3FFF));
        assert_eq!((y.absinfo.minimum, y.absinfo.maximum), (0, 0x3FFF));
    }

    #[test]
    fn test_create_fails_without_uinput_node() {
        let result = UinputSink::create_at(
            Path::new("/nonexistent/uinput"),
            "test",
            &Calibration::default(),
            1,
        );
        assert!(result.is_err());
    }
}

use crate::calibration::Calibration;
use crate::config::DriverOptions;
use crate::event::EventSink;
use crate::pipeline::{DrainStatus, InputPipeline};
use crate::serial::SerialPort;
use crate::translator::{TouchState, Translator};
use std::future::Future;
use std::os::unix::io::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;
use tracing::{debug, error, info, warn};

/// Lifecycle requests from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceControl {
    /// Validate calibration and start from a clean slate
    Init,
    /// Open and configure the serial line
    On,
    /// Close the serial line
    Off,
    /// Switch off and drop everything buffered
    Close,
}

/// One configured touchscreen
pub struct InexioDevice {
    options: DriverOptions,
    pipeline: InputPipeline,
    port: Option<SerialPort>,
}

impl InexioDevice {
    /// Build a device from validated options without touching the hardware
    pub fn new(options: DriverOptions) -> anyhow::Result<Self> {
        options.validate()?;

        let translator = Translator::new(options.calibration(), options.button_number);
        Ok(Self {
            pipeline: InputPipeline::new(translator),
            options,
            port: None,
        })
    }

    /// Build a device and make sure its serial line can be opened
    pub fn open(options: DriverOptions) -> anyhow::Result<Self> {
        let device = Self::new(options)?;
        info!(
            "{}: Using device {}.",
            device.name(),
            device.options.device.display()
        );

        if let Err(e) = SerialPort::open(&device.options.device) {
            error!("{}: {:#}", device.name(), e);
            return Err(e);
        }

        Ok(device)
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn calibration(&self) -> &Calibration {
        self.pipeline.translator().calibration()
    }

    pub fn touch_state(&self) -> &TouchState {
        self.pipeline.touch_state()
    }

    pub fn is_on(&self) -> bool {
        self.port.is_some()
    }

    /// Descriptor to watch for readability while the device is on
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.port.as_ref().map(|port| port.as_raw_fd())
    }

    /// Replace the calibration, e.g. after the screen was re-measured.
    ///
    /// A host sink that advertises axis ranges has to be told as well, see
    /// [`UinputSink::reconfigure`](crate::uinput::UinputSink::reconfigure).
    pub fn reconfigure(&mut self, calibration: Calibration) -> anyhow::Result<()> {
        calibration.validate()?;
        info!("{}: New calibration {:?}", self.name(), calibration);
        self.options.min_x = calibration.min_x;
        self.options.max_x = calibration.max_x;
        self.options.min_y = calibration.min_y;
        self.options.max_y = calibration.max_y;
        self.options.screen_width = calibration.screen_width;
        self.options.screen_height = calibration.screen_height;
        self.options.swap_axes = calibration.swap_axes;
        self.options.reporting_mode = calibration.mode;
        self.pipeline.translator_mut().reconfigure(calibration);
        Ok(())
    }

    pub fn control(&mut self, what: DeviceControl) -> anyhow::Result<()> {
        match what {
            DeviceControl::Init => {
                self.calibration().validate()?;
                self.pipeline.reset();
                debug!("{}: Init.", self.name());
            }
            DeviceControl::On => {
                info!("{}: On.", self.name());
                if self.is_on() {
                    return Ok(());
                }
                match SerialPort::open_configured(&self.options.device) {
                    Ok(port) => self.port = Some(port),
                    Err(e) => {
                        error!("{}: cannot switch on: {:#}", self.name(), e);
                        return Err(e);
                    }
                }
            }
            DeviceControl::Off => {
                info!("{}: Off.", self.name());
                self.port = None;
            }
            DeviceControl::Close => {
                self.port = None;
                self.pipeline.reset();
                debug!("{}: Closed.", self.name());
            }
        }
        Ok(())
    }

    /// Drain whatever the serial line has ready into `sink`.
    ///
    /// Does nothing while the device is off.
    pub fn read_input<S: EventSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> anyhow::Result<DrainStatus> {
        let Some(port) = self.port.as_mut() else {
            return Ok(DrainStatus::Idle);
        };
        self.pipeline.pump(port, sink)
    }

    /// Feed bytes obtained elsewhere through the framer and translator
    pub fn process_bytes<S: EventSink + ?Sized>(
        &mut self,
        bytes: &[u8],
        sink: &mut S,
    ) -> anyhow::Result<usize> {
        self.pipeline.process(bytes, sink)
    }

    /// Read the serial line whenever it becomes readable until `shutdown`
    /// completes, the line hangs up, or a read fails.
    ///
    /// The device must be on. It is switched off before returning.
    pub async fn run<S, F>(&mut self, sink: &mut S, shutdown: F) -> anyhow::Result<()>
    where
        S: EventSink + ?Sized,
        F: Future<Output = ()>,
    {
        let Some(fd) = self.raw_fd() else {
            anyhow::bail!("{}: device is off", self.name());
        };
        let async_fd = AsyncFd::new(fd)?;
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("{}: Shutting down", self.name());
                    break Ok(());
                }
                guard = async_fd.readable() => {
                    let mut guard = match guard {
                        Ok(guard) => guard,
                        Err(e) => break Err(e.into()),
                    };
                    match self.read_input(sink) {
                        Ok(DrainStatus::Idle) => guard.clear_ready(),
                        Ok(DrainStatus::Budget) => {}
                        Ok(DrainStatus::Closed) => {
                            warn!("{}: Device hung up", self.name());
                            break Err(anyhow::anyhow!("{}: device hung up", self.name()));
                        }
                        Err(e) => {
                            error!("{}: {:#}", self.name(), e);
                            break Err(e);
                        }
                    }
                }
            }
        };

        // Deregister before the descriptor is closed
        drop(async_fd);
        self.control(DeviceControl::Off)?;
        result
    }
}

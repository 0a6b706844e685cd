use clap::Parser;
use inexio::{DeviceControl, DriverOptions, InexioDevice, ReportingMode, UinputSink};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON options file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device the touchscreen is attached to
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Name of the virtual input device
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    min_x: Option<i32>,

    #[arg(long)]
    max_x: Option<i32>,

    #[arg(long)]
    min_y: Option<i32>,

    #[arg(long)]
    max_y: Option<i32>,

    /// Display the touchscreen is mounted on
    #[arg(long)]
    screen_number: Option<u32>,

    #[arg(long)]
    screen_width: Option<i32>,

    #[arg(long)]
    screen_height: Option<i32>,

    /// Button reported for touches (1 = left, 2 = middle, 3 = right)
    #[arg(short, long)]
    button: Option<u32>,

    /// Report calibration-space coordinates without scaling
    #[arg(long)]
    raw: bool,

    /// Exchange X and Y
    #[arg(long)]
    swap_axes: bool,
}

impl Args {
    fn into_options(self) -> anyhow::Result<DriverOptions> {
        let mut options = match &self.config {
            Some(path) => DriverOptions::load(path)?,
            None => DriverOptions::default(),
        };

        if let Some(device) = self.device {
            options.device = device;
        }
        if let Some(name) = self.name {
            options.name = name;
        }
        options.min_x = self.min_x.unwrap_or(options.min_x);
        options.max_x = self.max_x.unwrap_or(options.max_x);
        options.min_y = self.min_y.unwrap_or(options.min_y);
        options.max_y = self.max_y.unwrap_or(options.max_y);
        options.screen_number = self.screen_number.unwrap_or(options.screen_number);
        options.screen_width = self.screen_width.unwrap_or(options.screen_width);
        options.screen_height = self.screen_height.unwrap_or(options.screen_height);
        options.button_number = self.button.unwrap_or(options.button_number);
        if self.raw {
            options.reporting_mode = ReportingMode::Raw;
        }
        if self.swap_axes {
            options.swap_axes = true;
        }

        Ok(options)
    }
}

/// Wait for `signal`; if listening fails, log it and never resolve
async fn signal_or_pending<F>(signal: F, name: &str)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = signal_or_pending(tokio::signal::ctrl_c(), "SIGINT");

    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
                return;
            }
        };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate.recv() => {}
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = Args::parse().into_options()?;

    tracing::info!("Starting inexio driver");
    tracing::info!(
        "Screen {}: {}x{}, {} mode",
        options.screen_number,
        options.screen_width,
        options.screen_height,
        options.reporting_mode
    );

    let mut device = InexioDevice::open(options)?;
    let mut sink = UinputSink::create(
        device.name(),
        device.calibration(),
        device.options().button_number,
    )?;

    device.control(DeviceControl::Init)?;
    device.control(DeviceControl::On)?;

    let result = device.run(&mut sink, shutdown_signal()).await;
    device.control(DeviceControl::Close)?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_signal_listener_does_not_shut_down() {
        let failing = async { Err::<(), _>(io::Error::other("no signal driver")) };
        let listener = signal_or_pending(failing, "SIGINT");

        let waited = tokio::time::timeout(Duration::from_millis(50), listener).await;

        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_signal_resolves() {
        let delivered = async { Ok::<(), io::Error>(()) };
        let listener = signal_or_pending(delivered, "SIGINT");

        let waited = tokio::time::timeout(Duration::from_millis(50), listener).await;

        assert!(waited.is_ok());
    }
}

use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Non-blocking, read-only handle on the touchscreen's serial line
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    /// Open `path` without configuring the line
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open `path` and put the line into the controller's mode:
    /// 19200 baud, 8N1, raw, one byte minimum per read.
    pub fn open_configured(path: &Path) -> anyhow::Result<Self> {
        let port = Self::open(path)?;
        port.configure()
            .with_context(|| format!("Cannot set tty attributes for {}", path.display()))?;
        port.flush_input()?;
        Ok(port)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn configure(&self) -> io::Result<()> {
        let fd = self.file.as_raw_fd();

        let mut tty: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut tty) } != 0 {
            return Err(io::Error::last_os_error());
        }

        tty.c_iflag = libc::IGNBRK | libc::IGNPAR;
        tty.c_oflag = 0;
        tty.c_lflag = 0;
        tty.c_cflag = libc::CS8 | libc::CREAD | libc::CLOCAL | libc::HUPCL;
        #[cfg(target_os = "linux")]
        {
            tty.c_line = 0;
        }
        tty.c_cc[libc::VTIME] = 0;
        tty.c_cc[libc::VMIN] = 1;

        unsafe {
            if libc::cfsetispeed(&mut tty, libc::B19200) != 0
                || libc::cfsetospeed(&mut tty, libc::B19200) != 0
            {
                return Err(io::Error::last_os_error());
            }
            if libc::tcsetattr(fd, libc::TCSAFLUSH, &tty) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        debug!("Configured {} for 19200 8N1", self.path.display());
        Ok(())
    }

    /// Throw away anything the line received before we were listening
    pub fn flush_input(&self) -> anyhow::Result<()> {
        if unsafe { libc::tcflush(self.file.as_raw_fd(), libc::TCIFLUSH) } != 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to flush {}", self.path.display()));
        }
        Ok(())
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsRawFd for SerialPort {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

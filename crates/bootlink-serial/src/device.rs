//! Serial device abstraction
//!
//! [`SerialDevice`] is the handle the transport drives: open/close, chunked
//! reads, writes and the two control lines. [`SerialPortDevice`] implements
//! it on top of the `serialport` crate.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tokio::sync::mpsc;

/// A modem control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    /// Data Terminal Ready
    Dtr,
    /// Request To Send
    Rts,
}

/// Identity of a serial port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortInfo {
    /// OS name of the port (e.g. `/dev/ttyUSB0`, `COM3`)
    pub port_name: String,
    /// USB vendor ID, for USB ports
    pub vid: Option<u16>,
    /// USB product ID, for USB ports
    pub pid: Option<u16>,
    /// USB serial number
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let mut out = PortInfo {
            port_name: info.port_name,
            ..Default::default()
        };
        if let SerialPortType::UsbPort(usb) = info.port_type {
            out.vid = Some(usb.vid);
            out.pid = Some(usb.pid);
            out.serial_number = usb.serial_number;
            out.manufacturer = usb.manufacturer;
            out.product = usb.product;
        }
        out
    }
}

/// Device handle driven by [`Transport`](crate::Transport)
///
/// `read_chunk` must be cancel-safe: if its future is dropped before it
/// completes, no received bytes may be lost.
pub trait SerialDevice {
    /// Open the device at `baud_rate`
    async fn open(&mut self, baud_rate: u32) -> io::Result<()>;

    /// Close the device
    async fn close(&mut self) -> io::Result<()>;

    /// Whether the device has a read channel
    fn is_readable(&self) -> bool;

    /// Whether the device has a write channel
    fn is_writable(&self) -> bool;

    /// Wait for the next chunk of received bytes
    ///
    /// Returns `None` once the device will not deliver any more data.
    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Write all of `data`
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Set a control line
    async fn set_line(&mut self, line: ControlLine, level: bool) -> io::Result<()>;

    /// Identity of the underlying port, if known
    fn info(&self) -> Option<PortInfo> {
        None
    }
}

/// Enumerate the serial ports present on this machine
pub fn list_ports() -> io::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// How long the reader thread blocks before checking for shutdown
const READ_POLL: Duration = Duration::from_millis(20);
const CHUNK_SIZE: usize = 4096;
const CHANNEL_DEPTH: usize = 64;

type Chunk = io::Result<Vec<u8>>;

struct Reader {
    rx: mpsc::Receiver<Chunk>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Serial port device
///
/// A background thread reads the port and forwards chunks over a channel,
/// so an abandoned `read_chunk` leaves any delivered chunk queued.
pub struct SerialPortDevice {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    reader: Option<Reader>,
}

impl SerialPortDevice {
    /// Create a handle for `path`; nothing is opened yet
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
            reader: None,
        }
    }

    /// Port path this handle refers to
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port not open"))
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: mpsc::Sender<Chunk>, stop: Arc<AtomicBool>) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    while !stop.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            // End of stream (device unplugged)
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    log::debug!("serial reader thread exiting");
}

impl SerialDevice for SerialPortDevice {
    async fn open(&mut self, baud_rate: u32) -> io::Result<()> {
        // Reopening must not leave the old reader competing for bytes
        self.close().await?;

        let port = serialport::new(&self.path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL)
            .open()?;
        let reader_port = port.try_clone()?;

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("bootlink-reader".into())
                .spawn(move || read_loop(reader_port, tx, stop))?
        };

        log::info!("Opened serial port {} at {} baud", self.path, baud_rate);

        self.port = Some(port);
        self.reader = Some(Reader { rx, stop, thread });
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(Reader { rx, stop, thread }) = self.reader.take() {
            stop.store(true, Ordering::Relaxed);
            // Unblocks a reader stuck on a full channel
            drop(rx);
            let joined = tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(io::Error::other)?;
            if joined.is_err() {
                log::warn!("serial reader thread panicked");
            }
        }
        if self.port.take().is_some() {
            log::info!("Closed serial port {}", self.path);
        }
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.reader.is_some()
    }

    fn is_writable(&self) -> bool {
        self.port.is_some()
    }

    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.reader.as_mut() {
            Some(reader) => reader.rx.recv().await.transpose(),
            None => Ok(None),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()
    }

    async fn set_line(&mut self, line: ControlLine, level: bool) -> io::Result<()> {
        let port = self.port_mut()?;
        match line {
            ControlLine::Dtr => port.write_data_terminal_ready(level)?,
            ControlLine::Rts => port.write_request_to_send(level)?,
        }
        Ok(())
    }

    fn info(&self) -> Option<PortInfo> {
        serialport::available_ports()
            .ok()?
            .into_iter()
            .find(|p| p.port_name == self.path)
            .map(PortInfo::from)
    }
}

impl Drop for SerialPortDevice {
    fn drop(&mut self) {
        // The thread notices within one READ_POLL and exits on its own
        if let Some(reader) = &self.reader {
            reader.stop.store(true, Ordering::Relaxed);
        }
    }
}

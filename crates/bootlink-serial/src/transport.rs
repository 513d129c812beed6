//! Buffered, timed transport over a [`SerialDevice`]
//!
//! The transport keeps a leftover buffer holding every received byte that
//! has not been handed to a caller yet. Each read consumes the leftover
//! before asking the device for more, so a chunk that carries the tail of
//! one frame and the head of the next is split across two reads without
//! losing or duplicating bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bootlink_core::slip;
use tokio::time::{timeout_at, Instant};

use crate::device::{ControlLine, PortInfo, SerialDevice};
use crate::error::{Result, TransportError};
use crate::trace::Tracer;

/// Baud rate the ROM bootloader listens on after reset
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Minimum bytes a read waits for when the caller has no better bound
pub const DEFAULT_MIN_LENGTH: usize = 12;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Frame writes and unframe reads with SLIP
    pub slip: bool,
    /// Log every transfer at trace level
    pub tracing: bool,
    /// How often `disconnect` re-checks the channel locks
    pub unlock_poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            slip: false,
            tracing: false,
            unlock_poll_interval: Duration::from_millis(400),
        }
    }
}

/// Exclusive-use flag for one direction of the device
///
/// Clones share the flag, so an observer can watch whether a read or write
/// is in flight.
#[derive(Debug, Clone, Default)]
pub struct ChannelLock(Arc<AtomicBool>);

impl ChannelLock {
    /// Whether an operation currently holds this channel
    pub fn is_locked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn acquire(&self) -> ChannelGuard {
        self.0.store(true, Ordering::Release);
        ChannelGuard(self.0.clone())
    }
}

/// Releases the channel when dropped, including when a read is cancelled
struct ChannelGuard(Arc<AtomicBool>);

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read and write channel locks of a transport
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// Held while a read waits on the device
    pub read: ChannelLock,
    /// Held while a write is in progress
    pub write: ChannelLock,
}

/// Bootloader transport
///
/// Calls take `&mut self`, so operations on one transport never overlap.
pub struct Transport<D: SerialDevice> {
    device: D,
    config: TransportConfig,
    leftover: Vec<u8>,
    baud_rate: u32,
    /// Last level commanded on DTR, re-sent after every RTS change
    dtr_state: bool,
    read_lock: ChannelLock,
    write_lock: ChannelLock,
    tracer: Tracer,
}

fn deadline_after(timeout_ms: u64) -> Option<Instant> {
    (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms))
}

impl<D: SerialDevice> Transport<D> {
    /// Create a transport with default configuration
    pub fn new(device: D) -> Self {
        Self::with_config(device, TransportConfig::default())
    }

    /// Create a transport with the given configuration
    pub fn with_config(device: D, config: TransportConfig) -> Self {
        let tracer = Tracer::new(config.tracing);
        Self {
            device,
            config,
            leftover: Vec::new(),
            baud_rate: 0,
            dtr_state: false,
            read_lock: ChannelLock::default(),
            write_lock: ChannelLock::default(),
            tracer,
        }
    }

    /// Open the device at `baud_rate` and drop any buffered bytes
    pub async fn connect(&mut self, baud_rate: u32) -> Result<()> {
        self.device
            .open(baud_rate)
            .await
            .map_err(|source| TransportError::DeviceOpen {
                baud: baud_rate,
                source,
            })?;
        self.baud_rate = baud_rate;
        self.leftover.clear();
        Ok(())
    }

    /// Wait until no read or write holds the device, then close it
    ///
    /// There is no upper bound on the wait.
    pub async fn disconnect(&mut self) -> Result<()> {
        while self.read_lock.is_locked() || self.write_lock.is_locked() {
            log::debug!("disconnect: waiting for channels to unlock");
            tokio::time::sleep(self.config.unlock_poll_interval).await;
        }
        self.device.close().await?;
        Ok(())
    }

    /// Drive DTR and remember the level for [`set_rts`](Self::set_rts)
    pub async fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.dtr_state = level;
        self.device.set_line(ControlLine::Dtr, level).await?;
        Ok(())
    }

    /// Drive RTS, then re-send the last DTR level
    ///
    /// Some USB-serial drivers only emit a SET_CONTROL_LINE_STATE request
    /// when DTR changes; the dummy DTR write carries the new RTS level out.
    pub async fn set_rts(&mut self, level: bool) -> Result<()> {
        self.device.set_line(ControlLine::Rts, level).await?;
        self.set_dtr(self.dtr_state).await
    }

    /// Sleep for `ms` milliseconds
    pub async fn sleep(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Send `data`, SLIP-framed if framing is enabled
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let framed;
        let out = if self.config.slip {
            framed = slip::encode(data);
            &framed[..]
        } else {
            data
        };

        if !self.device.is_writable() {
            log::debug!("write: device has no write channel, dropping {} bytes", out.len());
            return Ok(());
        }

        let _guard = self.write_lock.acquire();
        self.tracer.bytes("Write", out);
        self.device.write_all(out).await?;
        Ok(())
    }

    /// Read one response
    ///
    /// With framing enabled a complete frame already in the leftover buffer
    /// is returned without touching the device. Otherwise chunks are read
    /// until at least `min_length` bytes are buffered; those bytes are then
    /// returned as-is, or decoded when framing is enabled. An incomplete frame
    /// stays buffered and an empty payload is returned.
    ///
    /// `timeout_ms` of 0 waits forever. On timeout the bytes received so far
    /// remain buffered.
    pub async fn read(&mut self, timeout_ms: u64, min_length: usize) -> Result<Vec<u8>> {
        if self.config.slip {
            if let Some(payload) = self.take_frame() {
                return Ok(payload);
            }
        }

        if !self.device.is_readable() {
            return Ok(Vec::new());
        }

        let guard = self.read_lock.acquire();
        let deadline = deadline_after(timeout_ms);
        loop {
            let chunk = self.next_chunk(deadline, timeout_ms).await?;
            self.leftover.extend_from_slice(&chunk);
            if self.leftover.len() >= min_length {
                break;
            }
        }
        drop(guard);

        self.tracer.bytes("Read", &self.leftover);

        if self.config.slip {
            let payload = self.take_frame().unwrap_or_default();
            self.tracer.bytes("Slip reader results", &payload);
            return Ok(payload);
        }
        Ok(std::mem::take(&mut self.leftover))
    }

    /// Read without framing or length gating
    ///
    /// Returns buffered bytes if there are any, otherwise the next chunk from
    /// the device (empty if the device cannot be read).
    pub async fn raw_read(&mut self, timeout_ms: u64) -> Result<Vec<u8>> {
        if !self.leftover.is_empty() {
            return Ok(std::mem::take(&mut self.leftover));
        }
        if !self.device.is_readable() {
            return Ok(Vec::new());
        }

        let _guard = self.read_lock.acquire();
        let chunk = self.next_chunk(deadline_after(timeout_ms), timeout_ms).await?;
        self.tracer.bytes("Raw read", &chunk);
        Ok(chunk)
    }

    async fn next_chunk(&mut self, deadline: Option<Instant>, timeout_ms: u64) -> Result<Vec<u8>> {
        let chunk = match deadline {
            Some(deadline) => timeout_at(deadline, self.device.read_chunk())
                .await
                .map_err(|_| {
                    log::debug!(
                        "read: timed out after {} ms with {} bytes buffered",
                        timeout_ms,
                        self.leftover.len()
                    );
                    TransportError::Timeout { timeout_ms }
                })??,
            None => self.device.read_chunk().await?,
        };
        chunk.ok_or(TransportError::Closed)
    }

    /// Pop the first complete frame off the leftover buffer
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        let frame = slip::decode(&self.leftover);
        if !frame.complete {
            return None;
        }
        let remainder = frame.remainder.to_vec();
        let payload = frame.payload;
        self.leftover = remainder;
        Some(payload)
    }

    /// Enable or disable SLIP framing
    pub fn set_slip(&mut self, enabled: bool) {
        self.config.slip = enabled;
    }

    /// Whether SLIP framing is enabled
    pub fn slip_enabled(&self) -> bool {
        self.config.slip
    }

    /// Enable or disable transfer tracing
    pub fn set_tracing(&mut self, enabled: bool) {
        self.config.tracing = enabled;
        self.tracer.set_enabled(enabled);
    }

    /// Baud rate passed to the last successful `connect`
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Bytes received but not yet returned
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Read/write channel locks
    pub fn channel_state(&self) -> ChannelState {
        ChannelState {
            read: self.read_lock.clone(),
            write: self.write_lock.clone(),
        }
    }

    /// Identity of the underlying port
    pub fn info(&self) -> Option<PortInfo> {
        self.device.info()
    }

    /// USB product ID of the underlying port
    pub fn pid(&self) -> Option<u16> {
        self.info().and_then(|info| info.pid)
    }

    /// One-line description of the USB identity (empty if unknown)
    pub fn describe(&self) -> String {
        match self.info() {
            Some(PortInfo {
                vid: Some(vid),
                pid: Some(pid),
                ..
            }) => format!("USB VID 0x{:04X} PID 0x{:04X}", vid, pid),
            _ => String::new(),
        }
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The underlying device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;
    use bootlink_core::slip::{encode, END};

    fn slip_transport(device: MockDevice) -> Transport<MockDevice> {
        Transport::with_config(
            device,
            TransportConfig {
                slip: true,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_connect() {
        let mut t = Transport::new(MockDevice::new());
        t.connect(460_800).await.unwrap();
        assert_eq!(t.baud_rate(), 460_800);
        assert_eq!(t.device().opened_at, Some(460_800));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let mut dev = MockDevice::new();
        dev.fail_open = true;
        let mut t = Transport::new(dev);
        let err = t.connect(921_600).await.unwrap_err();
        assert!(matches!(err, TransportError::DeviceOpen { baud: 921_600, .. }));
        assert_eq!(t.baud_rate(), 0);
    }

    #[tokio::test]
    async fn test_second_frame_served_from_leftover() {
        let mut chunk = encode(&[0x01, 0x08, 0x04]);
        chunk.extend_from_slice(&encode(&[0x01, 0x02, END]));
        let mut t = slip_transport(MockDevice::with_chunks([chunk]));

        assert_eq!(t.read(0, 4).await.unwrap(), vec![0x01, 0x08, 0x04]);
        assert_eq!(t.device().reads, 1);

        assert_eq!(t.read(0, 4).await.unwrap(), vec![0x01, 0x02, END]);
        assert_eq!(t.device().reads, 1);
        assert!(t.leftover().is_empty());
    }

    #[tokio::test]
    async fn test_accumulates_to_min_length() {
        let dev = MockDevice::with_chunks([vec![END, 0x01], vec![0x02], vec![0x03, END]]);
        let mut t = slip_transport(dev);
        assert_eq!(t.read(0, 5).await.unwrap(), vec![0x01, 0x02, 0x03]);
        assert_eq!(t.device().reads, 3);
    }

    #[tokio::test]
    async fn test_reads_at_least_one_chunk() {
        let dev = MockDevice::with_chunks([vec![0xAA]]);
        let mut t = Transport::new(dev);
        assert_eq!(t.read(0, 0).await.unwrap(), vec![0xAA]);
        assert_eq!(t.device().reads, 1);
    }

    #[tokio::test]
    async fn test_incomplete_frame_kept() {
        let dev = MockDevice::with_chunks([vec![END, 0x01, 0x02, 0x03], vec![END]]);
        let mut t = slip_transport(dev);

        assert!(t.read(0, 4).await.unwrap().is_empty());
        assert_eq!(t.leftover(), &[END, 0x01, 0x02, 0x03]);

        assert_eq!(t.read(0, 4).await.unwrap(), vec![0x01, 0x02, 0x03]);
        assert!(t.leftover().is_empty());
    }

    #[tokio::test]
    async fn test_unframed_read_is_verbatim() {
        let dev = MockDevice::with_chunks([vec![END, 0x01], vec![0x02, 0x03]]);
        let mut t = Transport::new(dev);
        assert_eq!(t.read(0, 3).await.unwrap(), vec![END, 0x01, 0x02, 0x03]);
        assert!(t.leftover().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_partial_bytes() {
        let mut dev = MockDevice::with_chunks([vec![0x01, 0x02]]);
        dev.hang_when_empty = true;
        let mut t = Transport::new(dev);

        let start = Instant::now();
        let err = t.read(50, 12).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { timeout_ms: 50 }));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(t.leftover(), &[0x01, 0x02]);
        assert!(!t.channel_state().read.is_locked());

        t.device_mut().chunks.push_back(vec![0x03]);
        assert_eq!(t.read(50, 3).await.unwrap(), vec![0x01, 0x02, 0x03]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_clears_leftover() {
        let mut dev = MockDevice::with_chunks([vec![0x01, 0x02]]);
        dev.hang_when_empty = true;
        let mut t = Transport::new(dev);

        assert!(t.read(50, 12).await.is_err());
        assert_eq!(t.leftover(), &[0x01, 0x02]);

        t.connect(DEFAULT_BAUD_RATE).await.unwrap();
        assert!(t.leftover().is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream_keeps_bytes() {
        let dev = MockDevice::with_chunks([vec![0x01]]);
        let mut t = Transport::new(dev);
        let err = t.read(0, 4).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert_eq!(t.leftover(), &[0x01]);
    }

    #[tokio::test]
    async fn test_unreadable_device() {
        let mut dev = MockDevice::new();
        dev.readable = false;
        let mut t = Transport::new(dev);
        assert!(t.read(0, 12).await.unwrap().is_empty());
        assert!(t.raw_read(0).await.unwrap().is_empty());
        assert_eq!(t.device().reads, 0);
    }

    #[tokio::test]
    async fn test_raw_read() {
        let dev = MockDevice::with_chunks([vec![0x10, 0x11], vec![0x12]]);
        let mut t = slip_transport(dev);

        // One chunk per call, no framing
        assert_eq!(t.raw_read(0).await.unwrap(), vec![0x10, 0x11]);
        assert_eq!(t.raw_read(0).await.unwrap(), vec![0x12]);
    }

    #[tokio::test]
    async fn test_raw_read_drains_leftover_first() {
        let mut chunk = encode(&[0x01]);
        chunk.extend_from_slice(&[0x55, 0x66]);
        let mut t = slip_transport(MockDevice::with_chunks([chunk, vec![0x77]]));

        assert_eq!(t.read(0, 1).await.unwrap(), vec![0x01]);
        assert_eq!(t.raw_read(0).await.unwrap(), vec![0x55, 0x66]);
        assert_eq!(t.device().reads, 1);
        assert_eq!(t.raw_read(0).await.unwrap(), vec![0x77]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raw_read_timeout() {
        let mut dev = MockDevice::new();
        dev.hang_when_empty = true;
        let mut t = Transport::new(dev);
        let err = t.raw_read(20).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { timeout_ms: 20 }));
        assert!(!t.channel_state().read.is_locked());
    }

    #[tokio::test]
    async fn test_write_framing() {
        let mut t = slip_transport(MockDevice::new());
        t.write(&[0x00, END]).await.unwrap();
        t.set_slip(false);
        t.write(&[0x00, END]).await.unwrap();

        assert_eq!(
            t.device().written,
            vec![encode(&[0x00, END]), vec![0x00, END]]
        );
        assert!(!t.channel_state().write.is_locked());
    }

    #[tokio::test]
    async fn test_write_failure_releases_lock() {
        let mut dev = MockDevice::new();
        dev.fail_write = true;
        let mut t = slip_transport(dev);

        let err = t.write(&[0x01]).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
        assert!(!t.channel_state().write.is_locked());
        assert!(t.device().written.is_empty());
    }

    #[tokio::test]
    async fn test_set_rts_resends_dtr() {
        let mut t = Transport::new(MockDevice::new());
        t.set_dtr(true).await.unwrap();
        t.set_rts(false).await.unwrap();
        t.set_dtr(false).await.unwrap();
        t.set_rts(true).await.unwrap();

        assert_eq!(
            t.device().lines,
            vec![
                (ControlLine::Dtr, true),
                (ControlLine::Rts, false),
                (ControlLine::Dtr, true),
                (ControlLine::Dtr, false),
                (ControlLine::Rts, true),
                (ControlLine::Dtr, false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_waits_for_unlock() {
        let mut t = Transport::new(MockDevice::new());
        t.connect(DEFAULT_BAUD_RATE).await.unwrap();

        let guard = t.channel_state().read.acquire();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(guard);
        });

        let start = Instant::now();
        t.disconnect().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(t.device().closed);
    }

    #[tokio::test]
    async fn test_describe() {
        let mut dev = MockDevice::new();
        dev.info = Some(PortInfo {
            port_name: "/dev/ttyACM0".into(),
            vid: Some(0x303A),
            pid: Some(0x1001),
            ..Default::default()
        });
        let t = Transport::new(dev);
        assert_eq!(t.describe(), "USB VID 0x303A PID 0x1001");
        assert_eq!(t.pid(), Some(0x1001));

        let t = Transport::new(MockDevice::new());
        assert_eq!(t.describe(), "");
        assert_eq!(t.pid(), None);
    }
}

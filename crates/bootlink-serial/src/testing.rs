//! Scripted in-memory device for tests

use std::collections::VecDeque;
use std::io;

use crate::device::{ControlLine, PortInfo, SerialDevice};

/// Replays queued chunks and records everything written to it
#[derive(Debug)]
pub(crate) struct MockDevice {
    pub chunks: VecDeque<Vec<u8>>,
    /// Block forever instead of reporting end of stream when `chunks` runs out
    pub hang_when_empty: bool,
    pub readable: bool,
    pub fail_open: bool,
    pub fail_write: bool,
    pub fail_lines: bool,
    pub opened_at: Option<u32>,
    pub closed: bool,
    pub reads: usize,
    pub written: Vec<Vec<u8>>,
    pub lines: Vec<(ControlLine, bool)>,
    pub info: Option<PortInfo>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            hang_when_empty: false,
            readable: true,
            fail_open: false,
            fail_write: false,
            fail_lines: false,
            opened_at: None,
            closed: false,
            reads: 0,
            written: Vec::new(),
            lines: Vec::new(),
            info: None,
        }
    }

    pub fn with_chunks(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let mut dev = Self::new();
        dev.chunks.extend(chunks);
        dev
    }
}

impl SerialDevice for MockDevice {
    async fn open(&mut self, baud_rate: u32) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        self.opened_at = Some(baud_rate);
        self.closed = false;
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_readable(&self) -> bool {
        self.readable
    }

    fn is_writable(&self) -> bool {
        true
    }

    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.reads += 1;
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        self.written.push(data.to_vec());
        Ok(())
    }

    async fn set_line(&mut self, line: ControlLine, level: bool) -> io::Result<()> {
        if self.fail_lines {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "line control failed"));
        }
        self.lines.push((line, level));
        Ok(())
    }

    fn info(&self) -> Option<PortInfo> {
        self.info.clone()
    }
}

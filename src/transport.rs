//! Byte transport underneath a connection.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::fs::FileExt;

/// Staging buffer size for the copying `send_file` fallback.
const FALLBACK_CHUNK: usize = 16 * 1024;

/// A non-blocking byte stream that can also stream a file range.
///
/// `read`/`write` follow the usual non-blocking contract: a
/// `WouldBlock` error means "try again on the next readiness event".
pub trait Transport: Read + Write {
    /// Moves up to `count` bytes of `file`, starting at `offset`, to the
    /// stream. Returns how many bytes were transferred.
    ///
    /// The default reads the range through a stack buffer and writes it
    /// once; bytes the stream did not accept are simply read again on the
    /// next call.
    fn send_file(&mut self, file: &File, offset: u64, count: usize) -> io::Result<usize> {
        let mut buf = [0u8; FALLBACK_CHUNK];
        let want = count.min(buf.len());
        let n = file.read_at(&mut buf[..want], offset)?;
        if n == 0 {
            return Ok(0);
        }
        self.write(&buf[..n])
    }
}

impl Transport for mio::net::TcpStream {
    #[cfg(target_os = "linux")]
    fn send_file(&mut self, file: &File, offset: u64, count: usize) -> io::Result<usize> {
        use std::os::fd::AsRawFd;

        let mut off = libc::off_t::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file offset overflow"))?;

        // SAFETY: both descriptors stay open for the duration of the call and
        // `off` is a valid, exclusively borrowed offset.
        let rc = unsafe { libc::sendfile(self.as_raw_fd(), file.as_raw_fd(), &mut off, count) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(rc as usize)
    }
}

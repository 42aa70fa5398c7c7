//! Resumable response transmission.
//!
//! A response is a status line followed, for `200 OK`, by the raw bytes of a
//! file. [`ResponseWriter::advance`] performs exactly one non-blocking I/O
//! attempt and records how far it got, so the caller can hand control back
//! to the event loop and resume on the next write-readiness event.

use std::fs::File;
use std::io::{self, ErrorKind};

use bytes::{Buf, Bytes};

use crate::http::resolve::FileBody;
use crate::http::response::StatusCode;
use crate::transport::Transport;

#[derive(Debug)]
pub enum TransferState {
    NotStarted,
    /// Header bytes not yet accepted by the socket
    SendingHeader(Bytes),
    SendingBody {
        file: File,
        offset: u64,
        total: u64,
    },
    Complete,
}

/// Outcome of a single [`ResponseWriter::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Bytes moved (or the call was interrupted); more remain
    Advanced,
    /// The socket cannot take anything right now
    WouldBlock,
    /// The whole response has been handed to the socket
    Complete,
}

#[derive(Debug)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    body: Option<FileBody>,
    state: TransferState,
    max_chunk: usize,
    sent: u64,
}

impl ResponseWriter {
    pub fn new(max_chunk: usize) -> Self {
        Self {
            status: None,
            body: None,
            state: TransferState::NotStarted,
            max_chunk: max_chunk.max(1),
            sent: 0,
        }
    }

    /// Fixes the response. Later calls are ignored: the status of a
    /// connection is decided once.
    pub fn prepare(&mut self, status: StatusCode, body: Option<FileBody>) {
        if self.status.is_some() {
            return;
        }
        self.status = Some(status);
        self.body = match status {
            StatusCode::Ok => body,
            _ => None,
        };
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Total bytes (header and body) accepted by the transport so far.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }

    /// Makes one bounded transfer attempt.
    ///
    /// A hard error leaves the writer `Complete` with any open file closed;
    /// the connection is expected to be torn down.
    pub fn advance<T: Transport + ?Sized>(&mut self, transport: &mut T) -> io::Result<Progress> {
        if matches!(self.state, TransferState::NotStarted) {
            let status = match self.status {
                Some(status) => status,
                None => {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        "response not prepared",
                    ));
                }
            };
            self.state = TransferState::SendingHeader(Bytes::from_static(status.status_line()));
        }

        let (next, progress) = match std::mem::replace(&mut self.state, TransferState::Complete) {
            TransferState::SendingHeader(header) => self.send_header(transport, header)?,
            TransferState::SendingBody {
                file,
                offset,
                total,
            } => self.send_body(transport, file, offset, total)?,
            TransferState::NotStarted | TransferState::Complete => {
                (TransferState::Complete, Progress::Complete)
            }
        };

        self.state = next;
        Ok(progress)
    }

    fn send_header<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        mut header: Bytes,
    ) -> io::Result<(TransferState, Progress)> {
        let n = match transport.write(header.chunk()) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Ok((TransferState::SendingHeader(header), Progress::WouldBlock));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                return Ok((TransferState::SendingHeader(header), Progress::Advanced));
            }
            Err(e) => return Err(e),
        };

        header.advance(n);
        self.sent += n as u64;

        if header.has_remaining() {
            return Ok((TransferState::SendingHeader(header), Progress::Advanced));
        }

        match self.body.take() {
            Some(FileBody { file, len }) if len > 0 => Ok((
                TransferState::SendingBody {
                    file,
                    offset: 0,
                    total: len,
                },
                Progress::Advanced,
            )),
            _ => Ok((TransferState::Complete, Progress::Complete)),
        }
    }

    fn send_body<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        file: File,
        offset: u64,
        total: u64,
    ) -> io::Result<(TransferState, Progress)> {
        let remaining = total - offset;
        let count = remaining.min(self.max_chunk as u64) as usize;

        let k = match transport.send_file(&file, offset, count) {
            Ok(k) => k,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Ok((
                    TransferState::SendingBody {
                        file,
                        offset,
                        total,
                    },
                    Progress::WouldBlock,
                ));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                return Ok((
                    TransferState::SendingBody {
                        file,
                        offset,
                        total,
                    },
                    Progress::Advanced,
                ));
            }
            Err(e) => return Err(e),
        };

        if k == 0 {
            // The file ended before `total` bytes were read from it.
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "file shrank during transfer",
            ));
        }

        let offset = offset + k as u64;
        self.sent += k as u64;

        if offset >= total {
            drop(file);
            return Ok((TransferState::Complete, Progress::Complete));
        }

        Ok((
            TransferState::SendingBody {
                file,
                offset,
                total,
            },
            Progress::Advanced,
        ))
    }
}

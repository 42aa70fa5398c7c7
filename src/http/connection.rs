use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::parser::{parse_request_line, ParseError};
use crate::http::request::RequestPath;
use crate::http::resolve::DocumentRoot;
use crate::http::response::StatusCode;
use crate::http::writer::{Progress, ResponseWriter, TransferState};
use crate::server::poller::Interest;
use crate::transport::Transport;

/// Per-connection buffer limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub receive_buffer_size: usize,
    pub max_path_len: usize,
    pub max_transfer_chunk: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            receive_buffer_size: 8192,
            max_path_len: 4096,
            max_transfer_chunk: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    AwaitingRequest,
    RequestReady,
    Responding,
    Closed,
}

/// What the event loop has to do after a receive or send step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing; wait for the next readiness event.
    Wait,
    /// Re-register with this interest. Also used with the current interest
    /// to re-arm after progress that did not exhaust readiness.
    Reregister(Interest),
    /// Deregister and drop the connection.
    Close,
}

/// One client session, driven one non-blocking step at a time.
pub struct Connection<T> {
    transport: T,
    peer: Option<SocketAddr>,
    receive_buffer: Box<[u8]>,
    received_length: usize,
    requested_path: RequestPath,
    writer: ResponseWriter,
    state: LifecycleState,
    last_active: Instant,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, peer: Option<SocketAddr>, limits: ConnectionLimits) -> Self {
        Self {
            transport,
            peer,
            receive_buffer: vec![0u8; limits.receive_buffer_size].into_boxed_slice(),
            received_length: 0,
            requested_path: RequestPath::with_capacity(limits.max_path_len),
            writer: ResponseWriter::new(limits.max_transfer_chunk),
            state: LifecycleState::AwaitingRequest,
            last_active: Instant::now(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Registration interest matching the lifecycle state.
    pub fn interest(&self) -> Interest {
        match self.state {
            LifecycleState::AwaitingRequest | LifecycleState::Closed => Interest::Readable,
            LifecycleState::RequestReady | LifecycleState::Responding => Interest::Writable,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn requested_path(&self) -> &RequestPath {
        &self.requested_path
    }

    pub fn response_status(&self) -> Option<StatusCode> {
        self.writer.status()
    }

    pub fn transfer_state(&self) -> &TransferState {
        self.writer.state()
    }

    pub fn received(&self) -> &[u8] {
        &self.receive_buffer[..self.received_length]
    }

    pub fn bytes_sent(&self) -> u64 {
        self.writer.bytes_sent()
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Handles read-readiness: one read, then an attempt to parse the
    /// request line from everything buffered so far.
    pub fn receive_step(&mut self, root: &DocumentRoot) -> Step {
        if self.state != LifecycleState::AwaitingRequest {
            return Step::Wait;
        }
        self.last_active = Instant::now();

        if self.received_length == self.receive_buffer.len() {
            return self.reject(ParseError::RequestTooLarge);
        }

        let n = match self
            .transport
            .read(&mut self.receive_buffer[self.received_length..])
        {
            Ok(0) => {
                tracing::debug!(peer = ?self.peer, "Connection closed by peer");
                self.close();
                return Step::Close;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Step::Wait,
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                return Step::Reregister(Interest::Readable);
            }
            Err(e) => {
                tracing::warn!(peer = ?self.peer, error = %e, "Error receiving request");
                self.close();
                return Step::Close;
            }
        };

        self.received_length += n;
        tracing::trace!(
            peer = ?self.peer,
            bytes = n,
            buffered = %String::from_utf8_lossy(self.received()),
            "Received data"
        );

        match parse_request_line(
            &self.receive_buffer[..self.received_length],
            &mut self.requested_path,
        ) {
            Ok(_) => self.accept_request(root),
            Err(ParseError::Incomplete) if self.received_length < self.receive_buffer.len() => {
                Step::Reregister(Interest::Readable)
            }
            Err(ParseError::Incomplete) => self.reject(ParseError::RequestTooLarge),
            Err(e) => self.reject(e),
        }
    }

    /// Handles write-readiness: one bounded attempt to push the response.
    pub fn send_step(&mut self) -> Step {
        match self.state {
            LifecycleState::AwaitingRequest => return Step::Wait,
            LifecycleState::Closed => return Step::Close,
            LifecycleState::RequestReady => self.state = LifecycleState::Responding,
            LifecycleState::Responding => {}
        }
        self.last_active = Instant::now();

        match self.writer.advance(&mut self.transport) {
            Ok(Progress::Advanced) => Step::Reregister(Interest::Writable),
            Ok(Progress::WouldBlock) => Step::Wait,
            Ok(Progress::Complete) => {
                tracing::debug!(
                    peer = ?self.peer,
                    path = %self.requested_path,
                    status = self.writer.status().map(|s| s.as_u16()),
                    bytes = self.writer.bytes_sent(),
                    "Response complete"
                );
                self.close();
                Step::Close
            }
            Err(e) => {
                tracing::warn!(
                    peer = ?self.peer,
                    path = %self.requested_path,
                    bytes = self.writer.bytes_sent(),
                    error = %e,
                    "Error sending response"
                );
                self.close();
                Step::Close
            }
        }
    }

    /// Marks the connection closed. Dropping it releases the socket and any
    /// file still open for the body.
    pub fn close(&mut self) {
        self.state = LifecycleState::Closed;
    }

    fn accept_request(&mut self, root: &DocumentRoot) -> Step {
        let status = match root.open(&self.requested_path) {
            Some(body) => {
                self.writer.prepare(StatusCode::Ok, Some(body));
                StatusCode::Ok
            }
            None => {
                self.writer.prepare(StatusCode::NotFound, None);
                StatusCode::NotFound
            }
        };

        tracing::debug!(
            peer = ?self.peer,
            path = %self.requested_path,
            status = status.as_u16(),
            "Request parsed"
        );

        self.state = LifecycleState::RequestReady;
        Step::Reregister(Interest::Writable)
    }

    fn reject(&mut self, error: ParseError) -> Step {
        tracing::debug!(peer = ?self.peer, error = ?error, "Malformed request");
        self.writer.prepare(StatusCode::BadRequest, None);
        self.state = LifecycleState::RequestReady;
        Step::Reregister(Interest::Writable)
    }
}

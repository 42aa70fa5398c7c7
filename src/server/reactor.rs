//! The event loop.
//!
//! One thread, one [`Poller`]. Every readiness event is routed through the
//! connection table by token; a connection is removed from the table and
//! deregistered in the same dispatch that closes it, so later events carrying
//! its token find nothing. Tokens are handed out from a counter and never
//! reused, so such a late event can never reach a newer connection either.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mio::Token;
use mio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionLimits, Step};
use crate::http::resolve::{DocumentRoot, ResolvePolicy};
use crate::server::listener::ListenerEndpoint;
use crate::server::poller::{Interest, Poller, Readiness};

pub const LISTENER: Token = Token(0);

pub struct Reactor {
    poller: Poller,
    listener: ListenerEndpoint,
    connections: HashMap<Token, Connection<TcpStream>>,
    next_token: usize,
    document_root: DocumentRoot,
    limits: ConnectionLimits,
    idle_timeout: Option<Duration>,
}

impl Reactor {
    /// Creates the poller, binds the listener and registers it.
    ///
    /// Failures here are startup failures and are returned to the caller.
    pub fn bind(cfg: &Config) -> Result<Self> {
        let poller = Poller::new(cfg.events_capacity).context("failed to create poller")?;
        let mut listener = ListenerEndpoint::bind(&cfg.listen_addr, cfg.backlog)?;
        poller
            .register(listener.source_mut(), LISTENER, Interest::Readable)
            .context("failed to register listener")?;

        let policy = if cfg.reject_traversal {
            ResolvePolicy::RejectTraversal
        } else {
            ResolvePolicy::Concatenate
        };

        Ok(Self {
            poller,
            listener,
            connections: HashMap::new(),
            next_token: LISTENER.0 + 1,
            document_root: DocumentRoot::new(cfg.document_root.clone(), policy),
            limits: ConnectionLimits {
                receive_buffer_size: cfg.receive_buffer_size,
                max_path_len: cfg.max_path_len,
                max_transfer_chunk: cfg.max_transfer_chunk,
            },
            idle_timeout: cfg.idle_timeout(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains_key(&token)
    }

    pub fn connection(&self, token: Token) -> Option<&Connection<TcpStream>> {
        self.connections.get(&token)
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.connections.keys().copied().collect()
    }

    /// Serves forever. Only a failing wait ends the loop.
    pub fn run(&mut self) -> Result<()> {
        info!(
            addr = %self.local_addr(),
            root = %self.document_root.root().display(),
            "Server waiting for connections"
        );

        loop {
            self.turn(self.idle_timeout)?;
        }
    }

    /// Waits once and dispatches every returned event in order.
    ///
    /// Returns the number of events dispatched.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let events = self
            .poller
            .wait(timeout)
            .context("failed to wait for readiness events")?;

        for event in &events {
            self.dispatch(*event);
        }

        if let Some(idle) = self.idle_timeout {
            self.sweep_idle(idle, Instant::now());
        }

        Ok(events.len())
    }

    pub fn dispatch(&mut self, event: Readiness) {
        let token = event.token;

        if token == LISTENER {
            if event.readable {
                self.accept_pending();
            }
            return;
        }

        if !self.connections.contains_key(&token) {
            trace!(token = token.0, "Ignoring event for unknown connection");
            return;
        }

        if event.readable {
            let step = match self.connections.get_mut(&token) {
                Some(conn) => conn.receive_step(&self.document_root),
                None => return,
            };
            if !self.apply(token, step) {
                return;
            }
        }

        if event.writable {
            let step = match self.connections.get_mut(&token) {
                Some(conn) => conn.send_step(),
                None => return,
            };
            self.apply(token, step);
        }
    }

    /// Tears down connections that have not made progress within `idle`.
    pub fn sweep_idle(&mut self, idle: Duration, now: Instant) {
        let expired: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.saturating_duration_since(conn.last_active()) >= idle)
            .map(|(token, _)| *token)
            .collect();

        for token in expired {
            debug!(token = token.0, "Closing idle connection");
            self.teardown(token);
        }
    }

    fn accept_pending(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(Some(pair)) => pair,
                Ok(None) => break,
                Err(e) => {
                    // Typically descriptor exhaustion; pending clients are
                    // picked up on a later readiness event.
                    warn!(error = %e, "Failed to accept connection");
                    break;
                }
            };

            let token = Token(self.next_token);
            self.next_token += 1;

            let mut conn = Connection::new(stream, Some(peer), self.limits);
            if let Err(e) = self
                .poller
                .register(conn.transport_mut(), token, Interest::Readable)
            {
                warn!(peer = %peer, error = %e, "Failed to register connection");
                continue;
            }

            info!(peer = %peer, token = token.0, "Accepted connection");
            self.connections.insert(token, conn);
        }
    }

    /// Applies a step result. Returns whether the connection is still live.
    fn apply(&mut self, token: Token, step: Step) -> bool {
        match step {
            Step::Wait => true,
            Step::Reregister(interest) => {
                let result = match self.connections.get_mut(&token) {
                    Some(conn) => self.poller.modify(conn.transport_mut(), token, interest),
                    None => return false,
                };
                if let Err(e) = result {
                    warn!(token = token.0, error = %e, "Failed to update registration");
                    self.teardown(token);
                    return false;
                }
                true
            }
            Step::Close => {
                self.teardown(token);
                false
            }
        }
    }

    /// The only teardown path. Removing an absent token does nothing.
    fn teardown(&mut self, token: Token) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };

        if let Err(e) = self.poller.unregister(conn.transport_mut()) {
            debug!(token = token.0, error = %e, "Failed to deregister connection");
        }
        conn.close();
        trace!(token = token.0, peer = ?conn.peer(), "Connection destroyed");
    }
}

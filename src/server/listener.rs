use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{Context, Result};
use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};

/// The bound, non-blocking listening socket.
pub struct ListenerEndpoint {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl ListenerEndpoint {
    /// Binds `addr` with `SO_REUSEADDR` and starts listening with the given
    /// backlog.
    pub fn bind(addr: &str, backlog: i32) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address {addr}"))?
            .next()
            .with_context(|| format!("listen address {addr} resolved to nothing"))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .context("failed to create listening socket")?;
        socket
            .set_reuse_address(true)
            .context("failed to set SO_REUSEADDR")?;
        socket
            .set_nonblocking(true)
            .context("failed to make listener non-blocking")?;
        socket
            .bind(&addr.into())
            .with_context(|| format!("failed to bind {addr}"))?;
        socket
            .listen(backlog)
            .with_context(|| format!("failed to listen on {addr}"))?;

        let std_listener: std::net::TcpListener = socket.into();
        let local_addr = std_listener.local_addr()?;

        Ok(Self {
            inner: TcpListener::from_std(std_listener),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one pending connection. `Ok(None)` means nothing is pending.
    pub fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        loop {
            match self.inner.accept() {
                Ok(pair) => return Ok(Some(pair)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn source_mut(&mut self) -> &mut TcpListener {
        &mut self.inner
    }
}

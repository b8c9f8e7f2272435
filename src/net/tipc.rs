//! TIPC stream sockets
//!
//! This module provides the connection and listener types for the TIPC
//! address family, and the builders that create them. Sockets are plain
//! blocking descriptors; deadlines are enforced with `poll(2)` before each
//! blocking call (see [`super::poll`]).

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

use socket2::{Domain, SockAddr, Socket, TcpKeepalive, Type};

use super::family::{self, AF_TIPC, TIPC_NETWORK};
use super::poll::{wait_readable, wait_writable};
use super::{Error, Result, Scope, TipcAddr};

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 128;

fn new_socket() -> io::Result<Socket> {
    Socket::new(Domain::from(AF_TIPC), Type::STREAM, None)
}

fn tipc_addr_of(sa: io::Result<SockAddr>) -> Option<TipcAddr> {
    sa.ok().as_ref().and_then(TipcAddr::from_sockaddr)
}

/// An established TIPC stream connection.
///
/// Options and I/O take `&self`; closing takes `&mut self`, so a close can
/// never race an option call on the same value.
#[derive(Debug)]
pub struct TipcConn {
    fd: Option<Socket>,
    laddr: Option<TipcAddr>,
    raddr: Option<TipcAddr>,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl TipcConn {
    /// Wrap a connected socket. No-delay is switched on; a socket that
    /// rejects the option is still usable.
    pub(crate) fn from_parts(
        socket: Socket,
        laddr: Option<TipcAddr>,
        raddr: Option<TipcAddr>,
    ) -> Self {
        let conn = TipcConn {
            fd: Some(socket),
            laddr,
            raddr,
            read_deadline: None,
            write_deadline: None,
        };
        if let Err(err) = conn.set_no_delay(true) {
            tracing::debug!(error = %err, "no-delay not applied");
        }
        conn
    }

    /// Adopt an already connected TIPC socket.
    ///
    /// Fails with [`Error::InvalidDescriptor`] (closing `fd`) unless the
    /// socket's local address is a TIPC address.
    pub fn from_fd(fd: OwnedFd) -> Result<Self> {
        let socket = Socket::from(fd);
        let laddr = socket
            .local_addr()
            .map_err(|err| Error::op("file", TIPC_NETWORK, None, err))?;
        let laddr = TipcAddr::from_sockaddr(&laddr)
            .ok_or_else(|| Error::op("file", TIPC_NETWORK, None, Error::InvalidDescriptor))?;
        let raddr = tipc_addr_of(socket.peer_addr());
        Ok(TipcConn::from_parts(socket, Some(laddr), raddr))
    }

    fn fd(&self) -> Result<&Socket> {
        self.fd.as_ref().ok_or(Error::InvalidDescriptor)
    }

    fn op_err(&self, op: &'static str, err: impl Into<Error>) -> Error {
        Error::op(op, TIPC_NETWORK, self.raddr.as_ref(), err)
    }

    /// Whether the connection has not been closed
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Local address as reported by the OS
    pub fn local_addr(&self) -> Option<TipcAddr> {
        self.laddr
    }

    /// Peer address as reported by the OS
    pub fn remote_addr(&self) -> Option<TipcAddr> {
        self.raddr
    }

    /// Read into `buf`, waiting at most until the read deadline.
    ///
    /// Returns `Ok(0)` at end of stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let fd = self.fd().map_err(|err| self.op_err("read", err))?;
        wait_readable(fd, self.read_deadline).map_err(|err| self.op_err("read", err))?;
        let mut sock = fd;
        sock.read(buf).map_err(|err| self.op_err("read", err))
    }

    /// Write all of `buf`, waiting at most until the write deadline.
    ///
    /// With a deadline set each send only queues what fits in the socket
    /// buffer, so a peer that stops reading cannot hold the caller past it.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let fd = self.fd().map_err(|err| self.op_err("write", err))?;
        let flags = match self.write_deadline {
            Some(_) => libc::MSG_NOSIGNAL | libc::MSG_DONTWAIT,
            None => libc::MSG_NOSIGNAL,
        };
        let mut written = 0;
        while written < buf.len() {
            wait_writable(fd, self.write_deadline).map_err(|err| self.op_err("write", err))?;
            match fd.send_with_flags(&buf[written..], flags) {
                Ok(0) => {
                    return Err(self.op_err("write", io::Error::from(io::ErrorKind::WriteZero)));
                }
                Ok(n) => written += n,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) => {}
                Err(err) => return Err(self.op_err("write", err)),
            }
        }
        Ok(written)
    }

    /// Copy everything from `src` into the connection.
    ///
    /// Always uses a buffered copy loop.
    pub fn read_from<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<u64> {
        self.fd().map_err(|err| self.op_err("readfrom", err))?;
        io::copy(src, self).map_err(|err| self.op_err("readfrom", err))
    }

    /// Shut down the reading side. Most callers should just use `close`.
    pub fn close_read(&self) -> Result<()> {
        self.shutdown(Shutdown::Read)
    }

    /// Shut down the writing side. Most callers should just use `close`.
    pub fn close_write(&self) -> Result<()> {
        self.shutdown(Shutdown::Write)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.fd()?
            .shutdown(how)
            .map_err(|err| self.op_err("shutdown", err))
    }

    /// Set what `close` does with data not yet sent or acknowledged.
    ///
    /// - `seconds < 0`: the OS finishes sending in the background (default)
    /// - `seconds == 0`: unsent data is discarded
    /// - `seconds > 0`: sent in the background; after `seconds` the OS may
    ///   discard what is left
    pub fn set_linger(&self, seconds: i32) -> Result<()> {
        let linger = u64::try_from(seconds).ok().map(Duration::from_secs);
        self.fd()?
            .set_linger(linger)
            .map_err(|err| self.op_err("set", err))
    }

    /// Current SO_LINGER setting
    pub fn linger(&self) -> Result<Option<Duration>> {
        self.fd()?.linger().map_err(|err| self.op_err("get", err))
    }

    /// Enable or disable keep-alive probes.
    pub fn set_keep_alive(&self, keepalive: bool) -> Result<()> {
        self.fd()?
            .set_keepalive(keepalive)
            .map_err(|err| self.op_err("set", err))
    }

    /// Set the idle time before and the interval between keep-alive probes.
    pub fn set_keep_alive_period(&self, period: Duration) -> Result<()> {
        let params = TcpKeepalive::new().with_time(period).with_interval(period);
        self.fd()?
            .set_tcp_keepalive(&params)
            .map_err(|err| self.op_err("set", err))
    }

    /// Control Nagle's algorithm. The default is `true`: data is sent as
    /// soon as possible after a write.
    pub fn set_no_delay(&self, no_delay: bool) -> Result<()> {
        self.fd()?
            .set_nodelay(no_delay)
            .map_err(|err| self.op_err("set", err))
    }

    /// Set both read and write deadlines. `None` clears them.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.fd()?;
        self.read_deadline = deadline;
        self.write_deadline = deadline;
        Ok(())
    }

    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.fd()?;
        self.read_deadline = deadline;
        Ok(())
    }

    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.fd()?;
        self.write_deadline = deadline;
        Ok(())
    }

    /// Close the connection. A second call fails with
    /// [`Error::InvalidDescriptor`].
    pub fn close(&mut self) -> Result<()> {
        let fd = self.fd.take().ok_or(Error::InvalidDescriptor)?;
        tracing::debug!(remote = %TipcAddr::describe(self.raddr.as_ref()), "closing connection");
        close_fd(fd.into_raw_fd()).map_err(|err| self.op_err("close", err))
    }
}

fn close_fd(fd: RawFd) -> io::Result<()> {
    if unsafe { libc::close(fd) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl Read for TipcConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        TipcConn::read(self, buf).map_err(io::Error::from)
    }
}

impl Write for TipcConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        TipcConn::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A listening TIPC stream socket.
#[derive(Debug)]
pub struct TipcListener {
    fd: Option<Socket>,
    laddr: TipcAddr,
    deadline: Option<Instant>,
}

impl TipcListener {
    pub(crate) fn from_parts(socket: Socket, laddr: TipcAddr) -> Self {
        TipcListener {
            fd: Some(socket),
            laddr,
            deadline: None,
        }
    }

    fn fd(&self) -> Result<&Socket> {
        self.fd.as_ref().ok_or(Error::InvalidDescriptor)
    }

    fn op_err(&self, op: &'static str, err: impl Into<Error>) -> Error {
        Error::op(op, TIPC_NETWORK, Some(&self.laddr), err)
    }

    /// Wait for the next connection, at most until the deadline.
    ///
    /// A timeout leaves the listener open.
    pub fn accept(&self) -> Result<TipcConn> {
        let fd = self.fd().map_err(|err| self.op_err("accept", err))?;
        wait_readable(fd, self.deadline).map_err(|err| self.op_err("accept", err))?;
        let (socket, peer) = fd.accept().map_err(|err| self.op_err("accept", err))?;

        let raddr = TipcAddr::from_sockaddr(&peer);
        let laddr = tipc_addr_of(socket.local_addr());
        tracing::debug!(
            listener = %self.laddr,
            remote = %TipcAddr::describe(raddr.as_ref()),
            "accepted connection"
        );
        Ok(TipcConn::from_parts(socket, laddr, raddr))
    }

    /// Address the listener is bound to, as reported by the OS.
    pub fn addr(&self) -> TipcAddr {
        self.laddr
    }

    /// Bound how long `accept` may wait. `None` disables the deadline.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.fd()?;
        self.deadline = deadline;
        Ok(())
    }

    /// Duplicate the listening descriptor, in blocking mode.
    ///
    /// Closing the listener does not affect the copy and vice versa.
    pub fn try_clone_fd(&self) -> Result<OwnedFd> {
        let socket = self
            .fd()?
            .try_clone()
            .map_err(|err| self.op_err("dup", err))?;
        socket
            .set_nonblocking(false)
            .map_err(|err| self.op_err("dup", err))?;
        Ok(OwnedFd::from(socket))
    }

    /// Stop listening. Connections already accepted stay open.
    pub fn close(&mut self) -> Result<()> {
        let fd = self.fd.take().ok_or(Error::InvalidDescriptor)?;
        tracing::debug!(addr = %self.laddr, "closing listener");
        close_fd(fd.into_raw_fd()).map_err(|err| self.op_err("close", err))
    }
}

impl AsRawFd for TipcListener {
    /// Returns -1 once the listener is closed.
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_ref().map_or(-1, |fd| fd.as_raw_fd())
    }
}

/// TIPC connection builder with timeout support
#[derive(Debug, Clone)]
pub struct TipcDialer {
    timeout: Option<Duration>,
    nodelay: bool,
    local: Option<TipcAddr>,
}

impl Default for TipcDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl TipcDialer {
    /// Create a dialer with default settings
    pub fn new() -> Self {
        TipcDialer {
            timeout: None,
            nodelay: true,
            local: None,
        }
    }

    /// Set connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the no-delay option on the new connection (default: true)
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Bind the socket to `addr` before connecting
    pub fn local_addr(mut self, addr: TipcAddr) -> Self {
        self.local = Some(addr);
        self
    }

    /// Dial `raddr` on `network`, which must be `"tipc"`.
    ///
    /// Both checks happen before a socket is created.
    pub fn dial(&self, network: &str, raddr: Option<&TipcAddr>) -> Result<TipcConn> {
        if family::lookup(network).is_none() {
            return Err(Error::op(
                "dial",
                network,
                raddr,
                Error::UnknownNetwork(network.to_string()),
            ));
        }
        let raddr = raddr.ok_or_else(|| Error::op("dial", network, None, Error::MissingAddress))?;
        self.connect(raddr)
    }

    /// Connect to `raddr`
    pub fn connect(&self, raddr: &TipcAddr) -> Result<TipcConn> {
        let wrap = |err: Error| Error::op("dial", TIPC_NETWORK, Some(raddr), err);

        let socket = new_socket().map_err(|err| wrap(err.into()))?;
        if let Some(local) = &self.local {
            socket
                .bind(&local.to_sockaddr())
                .map_err(|err| wrap(err.into()))?;
        }

        let target = raddr.to_sockaddr();
        match self.timeout {
            Some(timeout) => connect_timeout(&socket, &target, timeout).map_err(wrap)?,
            None => socket.connect(&target).map_err(|err| wrap(err.into()))?,
        }

        let laddr = tipc_addr_of(socket.local_addr());
        let peer = tipc_addr_of(socket.peer_addr()).or(Some(*raddr));
        let conn = TipcConn::from_parts(socket, laddr, peer);
        if !self.nodelay {
            if let Err(err) = conn.set_no_delay(false) {
                tracing::debug!(error = %err, "no-delay not cleared");
            }
        }

        tracing::debug!(
            local = %TipcAddr::describe(laddr.as_ref()),
            remote = %raddr,
            "dialed"
        );
        Ok(conn)
    }
}

/// Non-blocking connect, then wait for completion until `timeout`.
fn connect_timeout(socket: &Socket, target: &SockAddr, timeout: Duration) -> Result<()> {
    socket.set_nonblocking(true)?;

    match socket.connect(target) {
        Ok(()) => {}
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == Some(libc::EINPROGRESS) =>
        {
            wait_writable(socket, Some(Instant::now() + timeout))?;
            if let Some(err) = socket.take_error()? {
                return Err(Error::Io(err));
            }
        }
        Err(e) => return Err(Error::Io(e)),
    }

    socket.set_nonblocking(false)?;
    Ok(())
}

/// TIPC listener builder
#[derive(Debug, Clone)]
pub struct TipcListenerBuilder {
    backlog: i32,
    scope: Option<Scope>,
}

impl Default for TipcListenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TipcListenerBuilder {
    /// Create a listener builder with default settings
    pub fn new() -> Self {
        TipcListenerBuilder {
            backlog: DEFAULT_BACKLOG,
            scope: None,
        }
    }

    /// Set listen backlog (default: 128)
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Publish the bound name with `scope` instead of the address's own
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Listen on `laddr` on `network`, which must be `"tipc"`.
    ///
    /// Both checks happen before a socket is created.
    pub fn listen(&self, network: &str, laddr: Option<&TipcAddr>) -> Result<TipcListener> {
        if family::lookup(network).is_none() {
            return Err(Error::op(
                "listen",
                network,
                laddr,
                Error::UnknownNetwork(network.to_string()),
            ));
        }
        let laddr =
            laddr.ok_or_else(|| Error::op("listen", network, None, Error::MissingAddress))?;
        self.bind(laddr)
    }

    /// Bind to `laddr` and start listening
    pub fn bind(&self, laddr: &TipcAddr) -> Result<TipcListener> {
        let mut requested = *laddr;
        if let Some(scope) = self.scope {
            requested.scope = scope;
        }
        let wrap = |err: io::Error| Error::op("listen", TIPC_NETWORK, Some(&requested), err);

        let socket = new_socket().map_err(wrap)?;
        socket.bind(&requested.to_sockaddr()).map_err(wrap)?;
        socket.listen(self.backlog).map_err(wrap)?;

        let bound = tipc_addr_of(socket.local_addr()).unwrap_or(requested);
        tracing::debug!(requested = %requested, bound = ?bound, "listening");
        Ok(TipcListener::from_parts(socket, bound))
    }
}

/// Connect to `raddr` on `network`, which must be `"tipc"`.
///
/// If `laddr` is given the socket is bound to it first.
pub fn dial_tipc(
    network: &str,
    laddr: Option<&TipcAddr>,
    raddr: Option<&TipcAddr>,
) -> Result<TipcConn> {
    let mut dialer = TipcDialer::new();
    if let Some(laddr) = laddr {
        dialer = dialer.local_addr(*laddr);
    }
    dialer.dial(network, raddr)
}

/// Listen on `laddr` on `network`, which must be `"tipc"`.
///
/// Use [`TipcListener::addr`] to see the address the OS actually bound.
pub fn listen_tipc(network: &str, laddr: Option<&TipcAddr>) -> Result<TipcListener> {
    TipcListenerBuilder::new().listen(network, laddr)
}

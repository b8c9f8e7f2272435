//! Transport-agnostic connection traits
//!
//! [`Addr`], [`Conn`] and [`Listener`] let callers hold TIPC and TCP
//! endpoints behind the same trait objects.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use socket2::SockRef;

use super::poll::remaining;
use super::tipc::{TipcConn, TipcListener};
use super::{Error, Result, TipcAddr};

/// A network endpoint address.
pub trait Addr: fmt::Display + fmt::Debug + Send + Sync {
    /// Name of the network, e.g. "tipc" or "tcp"
    fn network(&self) -> &str;
}

/// A stream connection.
pub trait Conn: Read + Write + Send {
    fn local_addr(&self) -> Option<Box<dyn Addr>>;

    fn remote_addr(&self) -> Option<Box<dyn Addr>>;

    /// Bound reads and writes. `None` clears the deadline.
    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// A stream listener.
pub trait Listener: Send {
    /// Wait for and return the next connection.
    fn accept(&mut self) -> Result<Box<dyn Conn>>;

    fn addr(&self) -> Box<dyn Addr>;

    fn close(&mut self) -> Result<()>;
}

impl Addr for TipcAddr {
    fn network(&self) -> &str {
        TipcAddr::network(self)
    }
}

impl Addr for SocketAddr {
    fn network(&self) -> &str {
        "tcp"
    }
}

fn boxed<A: Addr + 'static>(addr: A) -> Box<dyn Addr> {
    Box::new(addr)
}

impl Conn for TipcConn {
    fn local_addr(&self) -> Option<Box<dyn Addr>> {
        TipcConn::local_addr(self).map(boxed)
    }

    fn remote_addr(&self) -> Option<Box<dyn Addr>> {
        TipcConn::remote_addr(self).map(boxed)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        TipcConn::set_deadline(self, deadline)
    }

    fn close(&mut self) -> Result<()> {
        TipcConn::close(self)
    }
}

impl Listener for TipcListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        let conn = TipcListener::accept(self)?;
        Ok(Box::new(conn))
    }

    fn addr(&self) -> Box<dyn Addr> {
        boxed(TipcListener::addr(self))
    }

    fn close(&mut self) -> Result<()> {
        TipcListener::close(self)
    }
}

/// A TCP stream with an absolute deadline.
///
/// Socket timeouts are relative, so the one matching the time left is
/// re-armed before every read and write.
#[derive(Debug)]
pub struct TcpConn {
    stream: TcpStream,
    deadline: Option<Instant>,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        TcpConn {
            stream,
            deadline: None,
        }
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }

    fn time_left(&self) -> io::Result<Option<Duration>> {
        match self.deadline {
            None => Ok(None),
            Some(deadline) => match remaining(deadline) {
                Some(left) => Ok(Some(left)),
                None => Err(Error::Timeout.into()),
            },
        }
    }
}

impl From<TcpStream> for TcpConn {
    fn from(stream: TcpStream) -> Self {
        TcpConn::new(stream)
    }
}

impl Read for TcpConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.time_left()?;
        self.stream.set_read_timeout(left)?;
        self.stream.read(buf)
    }
}

impl Write for TcpConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let left = self.time_left()?;
        self.stream.set_write_timeout(left)?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Conn for TcpConn {
    fn local_addr(&self) -> Option<Box<dyn Addr>> {
        self.stream.local_addr().ok().map(boxed)
    }

    fn remote_addr(&self) -> Option<Box<dyn Addr>> {
        self.stream.peer_addr().ok().map(boxed)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.deadline = deadline;
        if deadline.is_none() {
            self.stream.set_read_timeout(None)?;
            self.stream.set_write_timeout(None)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }
}

impl Listener for TcpListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        let (stream, _) = TcpListener::accept(self)?;
        stream.set_nodelay(true)?;
        Ok(Box::new(TcpConn::new(stream)))
    }

    fn addr(&self) -> Box<dyn Addr> {
        match self.local_addr() {
            Ok(addr) => boxed(addr),
            Err(_) => boxed(SocketAddr::from(([0, 0, 0, 0], 0))),
        }
    }

    /// Shuts the listening socket down; the descriptor itself is released
    /// on drop.
    fn close(&mut self) -> Result<()> {
        SockRef::from(&*self)
            .shutdown(Shutdown::Both)
            .map_err(Error::from)
    }
}

//! Conversion between [`TipcAddr`] and OS socket address records
//!
//! The kernel record is `struct sockaddr_tipc`:
//!
//! ```text
//! offset  size  field
//!      0     2  family   (AF_TIPC, native endian)
//!      2     1  addrtype
//!      3     1  scope
//!      4    12  addr     (service, instance, domain; little endian)
//! ```
//!
//! Records of any other family are classified but never converted.

use std::mem;
use std::ptr;

use socket2::SockAddr;

use super::addr::{AddrType, Scope, TipcAddr, WIRE_LEN};
use super::family::AF_TIPC;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RawSockaddrTipc {
    family: libc::sa_family_t,
    addrtype: u8,
    scope: i8,
    addr: [u8; WIRE_LEN],
}

const _: () = assert!(mem::size_of::<RawSockaddrTipc>() == 16);

/// Length of a TIPC socket address record.
pub const SOCKADDR_TIPC_LEN: usize = mem::size_of::<RawSockaddrTipc>();

/// An OS socket address, classified by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSockaddr {
    /// A TIPC record, payload still in wire form
    Tipc {
        addr_type: AddrType,
        scope: Scope,
        addr: [u8; WIRE_LEN],
    },
    /// A well-formed record of another family
    Other(libc::sa_family_t),
    /// Unspecified family, or too short to read
    Unrecognized,
}

impl RawSockaddr {
    /// Classify an address returned by the OS.
    pub fn from_sockaddr(sa: &SockAddr) -> Self {
        let len = sa.len() as usize;
        if len < mem::size_of::<libc::sa_family_t>() {
            return RawSockaddr::Unrecognized;
        }

        let family = sa.family();
        if family as libc::c_int == libc::AF_UNSPEC {
            return RawSockaddr::Unrecognized;
        }
        if family as libc::c_int != AF_TIPC {
            return RawSockaddr::Other(family);
        }
        if len < SOCKADDR_TIPC_LEN {
            return RawSockaddr::Unrecognized;
        }

        // SAFETY: the storage behind `sa` is a `sockaddr_storage` and at
        // least `SOCKADDR_TIPC_LEN` bytes of it are initialized.
        let raw = unsafe { ptr::read_unaligned(sa.as_ptr().cast::<RawSockaddrTipc>()) };
        RawSockaddr::Tipc {
            addr_type: AddrType(raw.addrtype),
            scope: Scope(raw.scope),
            addr: raw.addr,
        }
    }

    /// Build the OS record. Only the TIPC variant can be encoded.
    pub fn to_sockaddr(&self) -> Option<SockAddr> {
        match *self {
            RawSockaddr::Tipc {
                addr_type,
                scope,
                addr,
            } => Some(encode(addr_type, scope, addr)),
            RawSockaddr::Other(_) | RawSockaddr::Unrecognized => None,
        }
    }

    /// Whether this record belongs to the TIPC family
    pub fn is_tipc(&self) -> bool {
        matches!(self, RawSockaddr::Tipc { .. })
    }
}

fn encode(addr_type: AddrType, scope: Scope, addr: [u8; WIRE_LEN]) -> SockAddr {
    let raw = RawSockaddrTipc {
        family: AF_TIPC as libc::sa_family_t,
        addrtype: addr_type.raw(),
        scope: scope.raw(),
        addr,
    };
    // SAFETY: an all-zero `sockaddr_storage` is valid, and it is large
    // enough and suitably aligned for `RawSockaddrTipc`.
    unsafe {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        ptr::write(
            (&mut storage as *mut libc::sockaddr_storage).cast::<RawSockaddrTipc>(),
            raw,
        );
        SockAddr::new(storage, SOCKADDR_TIPC_LEN as libc::socklen_t)
    }
}

impl From<&TipcAddr> for RawSockaddr {
    fn from(addr: &TipcAddr) -> Self {
        RawSockaddr::Tipc {
            addr_type: addr.addr_type,
            scope: addr.scope,
            addr: addr.to_wire(),
        }
    }
}

/// Convert a classified OS record to a [`TipcAddr`].
///
/// Returns `None` for every non-TIPC record.
pub fn sockaddr_to_tipc(sa: &RawSockaddr) -> Option<TipcAddr> {
    match *sa {
        RawSockaddr::Tipc {
            addr_type,
            scope,
            addr,
        } => Some(TipcAddr::from_wire(addr_type, scope, addr)),
        RawSockaddr::Other(_) | RawSockaddr::Unrecognized => None,
    }
}

impl TipcAddr {
    /// Build the `sockaddr_tipc` record for this address
    pub fn to_sockaddr(&self) -> SockAddr {
        encode(self.addr_type, self.scope, self.to_wire())
    }

    /// Read an address returned by the OS, if it is a TIPC record
    pub fn from_sockaddr(sa: &SockAddr) -> Option<TipcAddr> {
        sockaddr_to_tipc(&RawSockaddr::from_sockaddr(sa))
    }
}

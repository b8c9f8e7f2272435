//! TIPC service address handling
//!
//! This module provides the value type for TIPC endpoints. A TIPC address
//! names a logical service rather than a host: a `(service, instance)` pair,
//! or a service with an inclusive range of instances.
//!
//! The 12 byte payload layout produced by [`TipcAddr::to_wire`] is the one
//! the kernel expects inside `struct sockaddr_tipc`: three little-endian
//! `u32` values in the order service, instance, domain. The address type and
//! scope travel beside the payload, not inside it.

use std::fmt;
use std::str::FromStr;

use super::family::{AF_TIPC, TIPC_NETWORK};
use super::resolver::{join_service_instance, join_service_instance_range, AddressParser};
use super::Error;

/// String used for absent addresses and address types that have no textual
/// form.
pub const NIL_ADDR: &str = "<nil>";

/// Size of the address payload inside `sockaddr_tipc`.
pub const WIRE_LEN: usize = 12;

/// Kind of a TIPC address, as carried in `sockaddr_tipc.addrtype`.
///
/// This is a newtype rather than an enum because the kernel reuses values
/// (`MULTICAST` and `NAME_SEQ` are both 1) and because any byte reported by
/// the OS must survive a round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddrType(pub u8);

impl AddrType {
    /// Service with an inclusive instance range
    pub const NAME_SEQ: Self = Self(1);
    /// Multicast destination; shares its value with `NAME_SEQ`
    pub const MULTICAST: Self = Self(1);
    /// Single service instance
    pub const NAME: Self = Self(2);
    /// Port identity (reference, node)
    pub const ID: Self = Self(3);

    /// Returns the raw byte.
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Publication scope of a bound name, as carried in `sockaddr_tipc.scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(pub i8);

impl Scope {
    pub const ZONE: Self = Self(1);
    pub const CLUSTER: Self = Self(2);
    pub const NODE: Self = Self(3);

    /// Returns the raw byte.
    pub const fn raw(self) -> i8 {
        self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::ZONE
    }
}

/// A TIPC endpoint address.
///
/// For [`AddrType::NAME_SEQ`] addresses `instance` is the lower bound and
/// `domain` the upper bound of the range. The order of the bounds is not
/// checked; the kernel accepts either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TipcAddr {
    pub addr_type: AddrType,
    /// Only used when binding
    pub scope: Scope,
    pub service: u32,
    pub instance: u32,
    pub domain: u32,
}

impl TipcAddr {
    /// Create a single-instance name address with zone scope
    pub const fn name(service: u32, instance: u32) -> Self {
        TipcAddr {
            addr_type: AddrType::NAME,
            scope: Scope::ZONE,
            service,
            instance,
            domain: 0,
        }
    }

    /// Create a name sequence address covering `low..=high`
    pub const fn name_seq(service: u32, low: u32, high: u32) -> Self {
        TipcAddr {
            addr_type: AddrType::NAME_SEQ,
            scope: Scope::ZONE,
            service,
            instance: low,
            domain: high,
        }
    }

    /// Return a copy with a different bind scope
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Network name, always `"tipc"`
    pub fn network(&self) -> &'static str {
        TIPC_NETWORK
    }

    /// OS address family constant
    pub fn family(&self) -> libc::c_int {
        AF_TIPC
    }

    /// TIPC has no wildcard local address.
    pub fn is_wildcard(&self) -> bool {
        false
    }

    /// Lower and upper instance bound for name sequences.
    pub fn instance_range(&self) -> Option<(u32, u32)> {
        if self.addr_type == AddrType::NAME_SEQ {
            Some((self.instance, self.domain))
        } else {
            None
        }
    }

    /// Encode service, instance and domain as the 12 byte payload.
    pub fn to_wire(&self) -> [u8; WIRE_LEN] {
        let mut raw = [0u8; WIRE_LEN];
        raw[0..4].copy_from_slice(&self.service.to_le_bytes());
        raw[4..8].copy_from_slice(&self.instance.to_le_bytes());
        raw[8..12].copy_from_slice(&self.domain.to_le_bytes());
        raw
    }

    /// Decode a 12 byte payload plus its out-of-band type and scope.
    pub fn from_wire(addr_type: AddrType, scope: Scope, raw: [u8; WIRE_LEN]) -> Self {
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        TipcAddr {
            addr_type,
            scope,
            service: word(0),
            instance: word(4),
            domain: word(8),
        }
    }

    /// Format an optional address, using `"<nil>"` for `None`
    pub fn describe(addr: Option<&TipcAddr>) -> String {
        match addr {
            Some(addr) => addr.to_string(),
            None => NIL_ADDR.to_string(),
        }
    }
}

impl fmt::Display for TipcAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr_type {
            AddrType::NAME => f.write_str(&join_service_instance(self.service, self.instance)),
            AddrType::NAME_SEQ => f.write_str(&join_service_instance_range(
                self.service,
                self.instance,
                self.domain,
            )),
            _ => f.write_str(NIL_ADDR),
        }
    }
}

impl FromStr for TipcAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AddressParser::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_basic() {
        let addr = TipcAddr::name(100, 200);
        assert_eq!(addr.addr_type, AddrType::NAME);
        assert_eq!(addr.scope, Scope::ZONE);
        assert_eq!(addr.domain, 0);
        assert_eq!(addr.network(), "tipc");
        assert_eq!(addr.family(), libc::AF_TIPC);
        assert!(!addr.is_wildcard());
        assert_eq!(addr.instance_range(), None);
        assert_eq!(addr.to_string(), "100;200");
    }

    #[test]
    fn test_name_seq_display() {
        let addr = TipcAddr::name_seq(100, 200, 300);
        assert_eq!(addr.instance_range(), Some((200, 300)));
        assert_eq!(addr.to_string(), "100;200-300");

        // Reversed bounds are kept as given
        let addr = TipcAddr::name_seq(7, 9, 3);
        assert_eq!(addr.to_string(), "7;9-3");
    }

    #[test]
    fn test_display_sentinel() {
        let mut addr = TipcAddr::name(1, 2);
        addr.addr_type = AddrType::ID;
        assert_eq!(addr.to_string(), NIL_ADDR);

        addr.addr_type = AddrType(0);
        assert_eq!(addr.to_string(), NIL_ADDR);

        assert_eq!(TipcAddr::describe(None), "<nil>");
        assert_eq!(TipcAddr::describe(Some(&TipcAddr::name(1, 2))), "1;2");
    }

    #[test]
    fn test_multicast_aliases_name_seq() {
        assert_eq!(AddrType::MULTICAST, AddrType::NAME_SEQ);
        assert_eq!(AddrType::NAME.raw(), 2);
        assert_eq!(AddrType::ID.raw(), 3);
        assert_eq!(Scope::default(), Scope::ZONE);
        assert_eq!(Scope::NODE.raw(), 3);
    }

    #[test]
    fn test_wire_layout() {
        let addr = TipcAddr::name_seq(0x0403_0201, 0x0807_0605, 0x0c0b_0a09);
        assert_eq!(
            addr.to_wire(),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );

        let addr = TipcAddr::name(u32::MAX, 1);
        assert_eq!(addr.to_wire(), [0xff, 0xff, 0xff, 0xff, 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_wire_round_trip() {
        let cases = [
            TipcAddr::name(0, 0),
            TipcAddr::name(u32::MAX, u32::MAX),
            TipcAddr::name_seq(18888, 17, 42).with_scope(Scope::NODE),
            TipcAddr {
                addr_type: AddrType::ID,
                scope: Scope(-1),
                service: 0xdead_beef,
                instance: 1,
                domain: 0x0100_1001,
            },
        ];

        for addr in cases {
            let back = TipcAddr::from_wire(addr.addr_type, addr.scope, addr.to_wire());
            assert_eq!(back, addr);
        }
    }

    #[test]
    fn test_from_str() {
        let addr: TipcAddr = "100;200".parse().unwrap();
        assert_eq!(addr, TipcAddr::name(100, 200));

        assert!("100:200".parse::<TipcAddr>().is_err());
    }

    #[test]
    fn test_with_scope() {
        let addr = TipcAddr::name(1, 2).with_scope(Scope::CLUSTER);
        assert_eq!(addr.scope, Scope::CLUSTER);
        // Scope does not show up in the text form
        assert_eq!(addr.to_string(), "1;2");
    }
}

//! Service address parsing and formatting
//!
//! This module converts between TIPC addresses and their textual form.
//!
//! Supported address formats:
//! - "100;200"     - service 100, instance 200
//! - "100;200-300" - service 100, instances 200 through 300
//!
//! All fields are unsigned 32-bit decimal integers. `;` separates the
//! service from the instance part and `-` separates the bounds of a range.
//! The older `.`-separated notation is not accepted.

use super::addr::{AddrType, Scope, TipcAddr};
use super::family::TIPC_NETWORK;
use super::{Error, Result};

/// Separates the service from the instance part.
pub const ADDRESS_DELIMITER: char = ';';

/// Separates the lower and upper bound of an instance range.
pub const RANGE_DELIMITER: char = '-';

/// Render `service;instance`.
pub fn join_service_instance(service: u32, instance: u32) -> String {
    format!("{}{}{}", service, ADDRESS_DELIMITER, instance)
}

/// Render `service;low-high`.
pub fn join_service_instance_range(service: u32, low: u32, high: u32) -> String {
    format!(
        "{}{}{}{}{}",
        service, ADDRESS_DELIMITER, low, RANGE_DELIMITER, high
    )
}

/// Parser for textual TIPC addresses
pub struct AddressParser;

impl AddressParser {
    /// Parse an address string into a [`TipcAddr`]
    ///
    /// Parsed addresses always carry [`Scope::ZONE`].
    ///
    /// # Examples
    /// ```
    /// use tipc_net::net::resolver::AddressParser;
    ///
    /// let addr = AddressParser::parse("100;200-300").unwrap();
    /// assert_eq!(addr.instance_range(), Some((200, 300)));
    /// ```
    pub fn parse(addr: &str) -> Result<TipcAddr> {
        let sep = addr.rfind(ADDRESS_DELIMITER).ok_or_else(|| {
            Error::MalformedAddress(format!("missing '{}' in {:?}", ADDRESS_DELIMITER, addr))
        })?;

        let service = Self::parse_field(&addr[..sep], "service")?;
        let rest = &addr[sep + 1..];

        match rest.rfind(RANGE_DELIMITER) {
            None => {
                let instance = Self::parse_field(rest, "instance")?;
                Ok(TipcAddr {
                    addr_type: AddrType::NAME,
                    scope: Scope::ZONE,
                    service,
                    instance,
                    domain: 0,
                })
            }
            Some(range_sep) => {
                let low = Self::parse_field(&rest[..range_sep], "range start")?;
                let high = Self::parse_field(&rest[range_sep + 1..], "range end")?;
                Ok(TipcAddr {
                    addr_type: AddrType::NAME_SEQ,
                    scope: Scope::ZONE,
                    service,
                    instance: low,
                    domain: high,
                })
            }
        }
    }

    /// Parse one unsigned decimal field
    ///
    /// `u32::from_str` accepts a leading `+`, so the digits are checked
    /// first.
    fn parse_field(field: &str, what: &str) -> Result<u32> {
        if field.is_empty() {
            return Err(Error::MalformedAddress(format!("empty {}", what)));
        }
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::MalformedAddress(format!(
                "invalid {}: {:?}",
                what, field
            )));
        }
        field.parse::<u32>().map_err(|_| {
            Error::MalformedAddress(format!("{} out of range: {}", what, field))
        })
    }
}

/// Parse `addr` as an address on `network`, which must be `"tipc"`.
pub fn resolve_tipc_addr(network: &str, addr: &str) -> Result<TipcAddr> {
    if network != TIPC_NETWORK {
        return Err(Error::UnknownNetwork(network.to_string()));
    }
    AddressParser::parse(addr)
}

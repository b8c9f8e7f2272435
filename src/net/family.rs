//! Network name to address family table
//!
//! The table is a `static` slice: it is fixed at compile time and never
//! mutated, so every thread sees the same mapping without synchronization.

/// Network name accepted by [`dial_tipc`](super::dial_tipc) and
/// [`listen_tipc`](super::listen_tipc).
pub const TIPC_NETWORK: &str = "tipc";

/// OS address family constant for TIPC sockets.
pub const AF_TIPC: libc::c_int = libc::AF_TIPC;

/// One row of the family table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyEntry {
    /// Network name as given by callers
    pub network: &'static str,
    /// `AF_*` constant passed to `socket(2)`
    pub family: libc::c_int,
}

static FAMILIES: &[FamilyEntry] = &[FamilyEntry {
    network: TIPC_NETWORK,
    family: AF_TIPC,
}];

/// Look up the address family registered for `network`.
pub fn lookup(network: &str) -> Option<FamilyEntry> {
    FAMILIES.iter().copied().find(|entry| entry.network == network)
}

/// All registered families.
pub fn entries() -> &'static [FamilyEntry] {
    FAMILIES
}

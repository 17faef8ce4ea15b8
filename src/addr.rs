//! Mesh address classification.
//!
//! The engine only needs enough address awareness to know whether a
//! destination can ever produce a unicast acknowledgement. Group and
//! broadcast destinations cannot, so queueing an acknowledged send to one
//! would stall the transmission queue forever.

/// The unassigned address — a node that has not been provisioned yet.
pub const ADDR_UNASSIGNED: u16 = 0x0000;

/// The all-nodes broadcast address.
pub const ADDR_ALL_NODES: u16 = 0xFFFF;

/// First group address.
pub const ADDR_GROUP_BASE: u16 = 0xC000;

/// A unicast element address (assigned, below the virtual/group range).
pub const fn is_unicast(addr: u16) -> bool {
    addr != ADDR_UNASSIGNED && addr < 0x8000
}

/// A group address, including the fixed all-* groups.
pub const fn is_group(addr: u16) -> bool {
    addr >= ADDR_GROUP_BASE
}

/// The all-nodes broadcast address.
pub const fn is_broadcast(addr: u16) -> bool {
    addr == ADDR_ALL_NODES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_is_not_unicast() {
        assert!(!is_unicast(ADDR_UNASSIGNED));
    }

    #[test]
    fn element_addresses_are_unicast() {
        assert!(is_unicast(0x0001));
        assert!(is_unicast(0x0010));
        assert!(is_unicast(0x7FFF));
    }

    #[test]
    fn virtual_and_group_ranges_are_not_unicast() {
        assert!(!is_unicast(0x8000));
        assert!(!is_unicast(0xC000));
        assert!(is_group(0xC000));
        assert!(is_group(ADDR_ALL_NODES));
    }

    #[test]
    fn broadcast_is_the_all_nodes_group() {
        assert!(is_broadcast(ADDR_ALL_NODES));
        assert!(is_group(ADDR_ALL_NODES));
        assert!(!is_broadcast(0xC000));
    }
}

//! The compiled-in set of interface counters polled every tick.

use crate::oid::Oid;

pub const DEFAULT_IF_INDEX: u32 = 59;

/// Column OIDs from IF-MIB / IF-MIB::ifXTable, without the instance index.
/// Order here is the order of every request and of the printed output.
pub const INTERFACE_COLUMNS: [(&str, &[u32]); 14] = [
    ("ifName", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1]),
    ("ifInErrors", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 14]),
    ("ifOutErrors", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 20]),
    ("ifInUnknownProtos", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 15]),
    ("ifOutDiscards", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 19]),
    ("ifInDiscards", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 13]),
    ("ifHCInOctets", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6]),
    ("ifHCOutOctets", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10]),
    ("ifHCInBroadcastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 9]),
    ("ifHCOutBroadcastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 13]),
    ("ifHCInMulticastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 8]),
    ("ifHCOutMulticastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 12]),
    ("ifHCInUcastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 7]),
    ("ifHCOutUcastPkts", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 11]),
];

fn column_oid(column: &[u32]) -> Oid {
    // every column starts with 1.3, so the arcs are always valid
    Oid::from_arcs(column.to_vec()).unwrap_or_else(|_| unreachable!("static interface column"))
}

/// The OID list for one interface, in request order.
pub fn interface_counter_oids(if_index: u32) -> Vec<Oid> {
    INTERFACE_COLUMNS
        .iter()
        .map(|(_, column)| column_oid(column).child(if_index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourteen_oids_ending_in_index() {
        let oids = interface_counter_oids(DEFAULT_IF_INDEX);
        assert_eq!(oids.len(), 14);
        assert!(oids.iter().all(|oid| oid.as_slice().last() == Some(&59)));
        assert_eq!(oids[0].to_string(), ".1.3.6.1.2.1.31.1.1.1.1.59");
        assert_eq!(oids[13].to_string(), ".1.3.6.1.2.1.31.1.1.1.11.59");
    }

    #[test]
    fn list_is_stable() {
        assert_eq!(interface_counter_oids(7), interface_counter_oids(7));
    }
}

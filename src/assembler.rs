//! Merges packets from the replay and recovery phases into final order.
use crate::codec::Packet;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Packet collection keyed by sequence number.
///
/// The first packet stored for a sequence number wins; later arrivals with the
/// same sequence are dropped whatever their other fields hold.
#[derive(Debug, Default)]
pub struct ResultAssembler {
    packets: BTreeMap<i32, Packet>,
}

impl ResultAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `packet` unless its sequence number is already present.
    /// Returns `true` when the packet was stored.
    pub fn insert(&mut self, packet: Packet) -> bool {
        match self.packets.entry(packet.sequence) {
            Entry::Vacant(slot) => {
                slot.insert(packet);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, sequence: i32) -> bool {
        self.packets.contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packets ascending by sequence number, one per sequence.
    pub fn into_ordered(self) -> Vec<Packet> {
        self.packets.into_values().collect()
    }
}

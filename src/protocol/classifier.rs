//! Packet Classifier
//!
//! Maps a packet to its stable kind name and decides whether it belongs to
//! the high-frequency set that is kept out of the packet log.

use super::{Packet, PacketKind};

/// Kinds that are relayed silently: movement, chunk streaming, inventory
/// sync, actor updates and similar telemetry.
pub const SUPPRESSED_KINDS: &[PacketKind] = &[
    PacketKind::MovePlayer,
    PacketKind::PlayerAuthInput,
    PacketKind::SetActorData,
    PacketKind::SetActorMotion,
    PacketKind::MoveActorAbsolute,
    PacketKind::MoveActorDelta,
    PacketKind::SubChunk,
    PacketKind::SubChunkRequest,
    PacketKind::ActorEvent,
    PacketKind::AvailableCommands,
    PacketKind::StartGame,
    PacketKind::BiomeDefinitionList,
    PacketKind::InventoryContent,
    PacketKind::InventoryTransaction,
    PacketKind::InventorySlot,
    PacketKind::CreativeContent,
    PacketKind::AddActor,
    PacketKind::LevelEvent,
    PacketKind::RemoveActor,
    PacketKind::LevelSoundEvent,
    PacketKind::SetTime,
    PacketKind::UpdateAttributes,
    PacketKind::NetworkChunkPublisherUpdate,
    PacketKind::LevelChunk,
    PacketKind::CraftingEvent,
    PacketKind::CraftingData,
];

/// Result of classifying a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: PacketKind,
    pub kind_name: &'static str,
    pub suppressed: bool,
}

impl PacketKind {
    /// Whether this kind is in the suppression set
    pub fn is_suppressed(&self) -> bool {
        SUPPRESSED_KINDS.contains(self)
    }
}

/// Classify a packet by its runtime kind
pub fn classify(packet: &Packet) -> Classification {
    let kind = packet.kind();
    Classification {
        kind,
        kind_name: kind.name(),
        suppressed: kind.is_suppressed(),
    }
}

//! Packet Representation

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::*;

/// Closed set of packet kinds the relay knows by name.
///
/// Anything else decodes as `Unknown` with its numeric id preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Login,
    PlayStatus,
    Disconnect,
    StartGame,
    Text,
    SetTime,
    AddActor,
    RemoveActor,
    MoveActorAbsolute,
    MovePlayer,
    LevelEvent,
    ActorEvent,
    UpdateAttributes,
    InventoryTransaction,
    SetActorData,
    SetActorMotion,
    PlayerAction,
    InventoryContent,
    InventorySlot,
    CraftingData,
    CraftingEvent,
    ChangeDimension,
    LevelChunk,
    RequestChunkRadius,
    AvailableCommands,
    SetLocalPlayerAsInitialised,
    LevelSoundEvent,
    NetworkChunkPublisherUpdate,
    BiomeDefinitionList,
    MoveActorDelta,
    PlayerAuthInput,
    CreativeContent,
    SubChunk,
    SubChunkRequest,
    StatusRequest,
    StatusResponse,
    Unknown(u32),
}

impl PacketKind {
    /// Every named kind
    pub const KNOWN: &'static [PacketKind] = &[
        PacketKind::Login,
        PacketKind::PlayStatus,
        PacketKind::Disconnect,
        PacketKind::StartGame,
        PacketKind::Text,
        PacketKind::SetTime,
        PacketKind::AddActor,
        PacketKind::RemoveActor,
        PacketKind::MoveActorAbsolute,
        PacketKind::MovePlayer,
        PacketKind::LevelEvent,
        PacketKind::ActorEvent,
        PacketKind::UpdateAttributes,
        PacketKind::InventoryTransaction,
        PacketKind::SetActorData,
        PacketKind::SetActorMotion,
        PacketKind::PlayerAction,
        PacketKind::InventoryContent,
        PacketKind::InventorySlot,
        PacketKind::CraftingData,
        PacketKind::CraftingEvent,
        PacketKind::ChangeDimension,
        PacketKind::LevelChunk,
        PacketKind::RequestChunkRadius,
        PacketKind::AvailableCommands,
        PacketKind::SetLocalPlayerAsInitialised,
        PacketKind::LevelSoundEvent,
        PacketKind::NetworkChunkPublisherUpdate,
        PacketKind::BiomeDefinitionList,
        PacketKind::MoveActorDelta,
        PacketKind::PlayerAuthInput,
        PacketKind::CreativeContent,
        PacketKind::SubChunk,
        PacketKind::SubChunkRequest,
        PacketKind::StatusRequest,
        PacketKind::StatusResponse,
    ];

    /// Stable human-readable name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            PacketKind::Login => "Login",
            PacketKind::PlayStatus => "PlayStatus",
            PacketKind::Disconnect => "Disconnect",
            PacketKind::StartGame => "StartGame",
            PacketKind::Text => "Text",
            PacketKind::SetTime => "SetTime",
            PacketKind::AddActor => "AddActor",
            PacketKind::RemoveActor => "RemoveActor",
            PacketKind::MoveActorAbsolute => "MoveActorAbsolute",
            PacketKind::MovePlayer => "MovePlayer",
            PacketKind::LevelEvent => "LevelEvent",
            PacketKind::ActorEvent => "ActorEvent",
            PacketKind::UpdateAttributes => "UpdateAttributes",
            PacketKind::InventoryTransaction => "InventoryTransaction",
            PacketKind::SetActorData => "SetActorData",
            PacketKind::SetActorMotion => "SetActorMotion",
            PacketKind::PlayerAction => "PlayerAction",
            PacketKind::InventoryContent => "InventoryContent",
            PacketKind::InventorySlot => "InventorySlot",
            PacketKind::CraftingData => "CraftingData",
            PacketKind::CraftingEvent => "CraftingEvent",
            PacketKind::ChangeDimension => "ChangeDimension",
            PacketKind::LevelChunk => "LevelChunk",
            PacketKind::RequestChunkRadius => "RequestChunkRadius",
            PacketKind::AvailableCommands => "AvailableCommands",
            PacketKind::SetLocalPlayerAsInitialised => "SetLocalPlayerAsInitialised",
            PacketKind::LevelSoundEvent => "LevelSoundEvent",
            PacketKind::NetworkChunkPublisherUpdate => "NetworkChunkPublisherUpdate",
            PacketKind::BiomeDefinitionList => "BiomeDefinitionList",
            PacketKind::MoveActorDelta => "MoveActorDelta",
            PacketKind::PlayerAuthInput => "PlayerAuthInput",
            PacketKind::CreativeContent => "CreativeContent",
            PacketKind::SubChunk => "SubChunk",
            PacketKind::SubChunkRequest => "SubChunkRequest",
            PacketKind::StatusRequest => "StatusRequest",
            PacketKind::StatusResponse => "StatusResponse",
            PacketKind::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Unknown(id) => write!(f, "Unknown({:#x})", id),
            other => f.write_str(other.name()),
        }
    }
}

/// A decoded protocol message.
///
/// Kinds the relay or the observer look inside get a dedicated body; every
/// other kind travels as `Generic` with its payload left opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum Packet {
    Login(Login),
    Disconnect(Disconnect),
    PlayStatus(PlayStatus),
    StartGame(Box<GameData>),
    ChangeDimension(ChangeDimension),
    PlayerAction(PlayerAction),
    SetLocalPlayerAsInitialised(SetLocalPlayerAsInitialised),
    RequestChunkRadius(RequestChunkRadius),
    Text(Text),
    /// Server list ping; only valid as the first packet on a connection
    StatusRequest,
    StatusResponse(ServerStatus),
    Generic { kind: PacketKind, payload: Vec<u8> },
}

impl Packet {
    /// Build an opaque packet of the given kind
    pub fn generic(kind: PacketKind, payload: impl Into<Vec<u8>>) -> Self {
        Packet::Generic {
            kind,
            payload: payload.into(),
        }
    }

    /// Runtime kind of this packet
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Login(_) => PacketKind::Login,
            Packet::Disconnect(_) => PacketKind::Disconnect,
            Packet::PlayStatus(_) => PacketKind::PlayStatus,
            Packet::StartGame(_) => PacketKind::StartGame,
            Packet::ChangeDimension(_) => PacketKind::ChangeDimension,
            Packet::PlayerAction(_) => PacketKind::PlayerAction,
            Packet::SetLocalPlayerAsInitialised(_) => PacketKind::SetLocalPlayerAsInitialised,
            Packet::RequestChunkRadius(_) => PacketKind::RequestChunkRadius,
            Packet::Text(_) => PacketKind::Text,
            Packet::StatusRequest => PacketKind::StatusRequest,
            Packet::StatusResponse(_) => PacketKind::StatusResponse,
            Packet::Generic { kind, .. } => *kind,
        }
    }

    /// Shorthand for a text message packet
    pub fn text(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Packet::Text(Text {
            source_name: source_name.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a disconnect packet
    pub fn disconnect(message: impl Into<String>) -> Self {
        Packet::Disconnect(Disconnect {
            message: message.into(),
            hide_screen: false,
        })
    }
}

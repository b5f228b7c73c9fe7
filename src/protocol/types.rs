//! Packet Payload Types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-component float vector used for positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Integer block coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Identity and capabilities a client declares when it logs in.
///
/// The relay forwards this verbatim when dialing the upstream so the
/// upstream sees the same identity the client presented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    pub display_name: String,
    pub game_version: String,
    pub device_os: String,
    pub device_id: String,
    pub language_code: String,
    #[serde(default)]
    pub skin_id: Option<String>,
}

/// World state handed out by the upstream at the end of its login exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub world_name: String,
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub game_mode: i32,
    pub dimension: i32,
    pub player_position: Vec3,
    pub world_spawn: BlockPos,
    pub time: i64,
}

/// Login request: the first packet on every connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub client_data: ClientData,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Disconnect notice carrying a human-readable reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disconnect {
    pub message: String,
    #[serde(default)]
    pub hide_screen: bool,
}

/// Play status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum PlayStatusCode {
    LoginSuccess = 0,
    LoginFailedClient = 1,
    LoginFailedServer = 2,
    PlayerSpawn = 3,
    LoginFailedInvalidTenant = 4,
    LoginFailedVanillaEdu = 5,
    LoginFailedEduVanilla = 6,
    LoginFailedServerFull = 7,
    LoginFailedEditorVanilla = 8,
    LoginFailedVanillaEditor = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayStatus {
    pub status: PlayStatusCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeDimension {
    pub dimension: i32,
    pub position: Vec3,
    pub respawn: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub entity_runtime_id: u64,
    pub action_type: i32,
    pub block_position: BlockPos,
    pub result_position: BlockPos,
    pub block_face: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLocalPlayerAsInitialised {
    pub entity_runtime_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChunkRadius {
    pub chunk_radius: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub source_name: String,
    pub message: String,
}

/// Server list entry returned to clients that ping before logging in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server_name: String,
    #[serde(default)]
    pub sub_name: String,
    pub player_count: i32,
    pub max_players: i32,
    #[serde(default)]
    pub show_version: bool,
}

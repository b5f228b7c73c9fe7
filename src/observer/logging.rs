//! Packet Logging Observer

use std::time::SystemTime;

use tracing::info;

use super::{Direction, PacketObserver};
use crate::protocol::{classify, BlockPos, Packet, PlayStatusCode, Vec3};

/// Structured description of one observed packet
#[derive(Debug, Clone, PartialEq)]
pub struct PacketRecord {
    pub direction: Direction,
    pub kind: &'static str,
    pub timestamp: SystemTime,
    pub details: RecordDetails,
}

/// Kind-specific fields worth surfacing
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDetails {
    ChangeDimension {
        dimension: i32,
        respawn: bool,
        position: Vec3,
    },
    PlayStatus {
        status: PlayStatusCode,
    },
    PlayerAction {
        action_type: i32,
        block_position: BlockPos,
        block_face: i32,
        result_position: BlockPos,
    },
    Initialised {
        entity_runtime_id: u64,
    },
    Generic {
        payload: String,
    },
}

/// Default observer: logs every packet outside the suppression set
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }

    /// Build the record for a packet, or `None` if its kind is suppressed
    pub fn record(&self, direction: Direction, packet: &Packet) -> Option<PacketRecord> {
        let classification = classify(packet);
        if classification.suppressed {
            return None;
        }

        let details = match packet {
            Packet::ChangeDimension(p) => RecordDetails::ChangeDimension {
                dimension: p.dimension,
                respawn: p.respawn,
                position: p.position,
            },
            Packet::PlayStatus(p) => RecordDetails::PlayStatus { status: p.status },
            Packet::PlayerAction(p) => RecordDetails::PlayerAction {
                action_type: p.action_type,
                block_position: p.block_position,
                block_face: p.block_face,
                result_position: p.result_position,
            },
            Packet::SetLocalPlayerAsInitialised(p) => RecordDetails::Initialised {
                entity_runtime_id: p.entity_runtime_id,
            },
            other => RecordDetails::Generic {
                payload: format!("{:?}", other),
            },
        };

        Some(PacketRecord {
            direction,
            kind: classification.kind_name,
            timestamp: SystemTime::now(),
            details,
        })
    }

    fn emit(&self, record: &PacketRecord) {
        let timestamp = humantime::format_rfc3339_millis(record.timestamp);
        match &record.details {
            RecordDetails::ChangeDimension {
                dimension,
                respawn,
                position,
            } => info!(
                direction = %record.direction,
                kind = record.kind,
                %timestamp,
                dimension,
                respawn,
                position = %position,
                "Received Change Dimension on {}",
                record.direction
            ),
            RecordDetails::PlayStatus { status } => info!(
                direction = %record.direction,
                kind = record.kind,
                %timestamp,
                status = ?status,
                status_code = *status as i32,
                "Received Play Status on {}",
                record.direction
            ),
            RecordDetails::PlayerAction {
                action_type,
                block_position,
                block_face,
                result_position,
            } => info!(
                direction = %record.direction,
                kind = record.kind,
                %timestamp,
                action_type,
                block_position = %block_position,
                block_face,
                result_position = %result_position,
                "Received Player Action on {}",
                record.direction
            ),
            RecordDetails::Initialised { entity_runtime_id } => info!(
                direction = %record.direction,
                kind = record.kind,
                %timestamp,
                entity_runtime_id,
                "Received Set Local Player As Initialised on {}",
                record.direction
            ),
            RecordDetails::Generic { payload } => info!(
                direction = %record.direction,
                kind = record.kind,
                %timestamp,
                payload = %payload,
                "Received {} on {}",
                record.kind,
                record.direction
            ),
        }
    }
}

impl PacketObserver for LoggingObserver {
    fn observe(&self, direction: Direction, packet: &Packet) {
        if let Some(record) = self.record(direction, packet) {
            self.emit(&record);
        }
    }
}

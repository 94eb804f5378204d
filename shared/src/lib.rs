use serde::{Deserialize, Serialize};
use std::fmt;

pub mod identity;

pub use identity::{derive_id, IdentityRegistry, RegisterOutcome, UnregisterOutcome};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 8192;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        player_name: String,
    },
    Heartbeat,
    Disconnect,

    PiecePlaced {
        id: String,
        signature: SpatialSignature,
    },
    ConstructionAmountChanged {
        id: String,
        amount: f32,
    },
    ConstructionCompleted {
        id: String,
    },
    DeconstructionCompleted {
        id: String,
    },

    Connected {
        player_id: u32,
    },
    WorldState {
        pieces: Vec<PieceState>,
    },
    PlayerLeft {
        player_id: u32,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Short name used in log lines and error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Connect { .. } => "Connect",
            Packet::Heartbeat => "Heartbeat",
            Packet::Disconnect => "Disconnect",
            Packet::PiecePlaced { .. } => "PiecePlaced",
            Packet::ConstructionAmountChanged { .. } => "ConstructionAmountChanged",
            Packet::ConstructionCompleted { .. } => "ConstructionCompleted",
            Packet::DeconstructionCompleted { .. } => "DeconstructionCompleted",
            Packet::Connected { .. } => "Connected",
            Packet::WorldState { .. } => "WorldState",
            Packet::PlayerLeft { .. } => "PlayerLeft",
            Packet::Disconnected { .. } => "Disconnected",
        }
    }

    /// Object id carried by world-change packets, if any.
    pub fn object_id(&self) -> Option<&str> {
        match self {
            Packet::PiecePlaced { id, .. }
            | Packet::ConstructionAmountChanged { id, .. }
            | Packet::ConstructionCompleted { id }
            | Packet::DeconstructionCompleted { id } => Some(id),
            _ => None,
        }
    }
}

/// Spawn-time transform of a world object, the input to id derivation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SpatialSignature {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl SpatialSignature {
    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new([x, y, z], [0.0, 0.0, 0.0, 1.0])
    }

    pub fn derive_id(&self) -> String {
        derive_id(&self.to_string())
    }
}

// One decimal per component: objects spawned at the same coarse transform on
// different machines must render the same signature.
impl fmt::Display for SpatialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [px, py, pz] = self.position;
        let [rx, ry, rz, rw] = self.rotation;
        write!(
            f,
            "({:.1}, {:.1}, {:.1})({:.1}, {:.1}, {:.1}, {:.1})",
            px, py, pz, rx, ry, rz, rw
        )
    }
}

/// Server-side view of one base piece, as sent to late joiners.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PieceState {
    pub id: String,
    pub signature: Option<SpatialSignature>,
    pub amount: f32,
}

pub fn construction_complete(amount: f32) -> bool {
    amount >= 1.0
}

pub fn deconstruction_complete(amount: f32) -> bool {
    amount <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_signature_formatting() {
        let signature = SpatialSignature::new([1.04, -2.0, 3.21], [0.0, 0.7071, 0.0, 0.7071]);
        assert_eq!(
            signature.to_string(),
            "(1.0, -2.0, 3.2)(0.0, 0.7, 0.0, 0.7)"
        );
    }

    #[test]
    fn test_signature_coarse_positions_share_id() {
        let a = SpatialSignature::at(10.01, 0.0, 5.0);
        let b = SpatialSignature::at(10.04, 0.0, 5.0);
        let c = SpatialSignature::at(10.5, 0.0, 5.0);

        assert_eq!(a.derive_id(), b.derive_id());
        assert_ne!(a.derive_id(), c.derive_id());
    }

    #[test]
    fn test_completion_thresholds() {
        assert!(construction_complete(1.0));
        assert!(construction_complete(1.2));
        assert!(!construction_complete(0.999));

        assert!(deconstruction_complete(0.0));
        assert!(deconstruction_complete(-0.1));
        assert!(!deconstruction_complete(0.01));
    }

    #[test]
    fn test_packet_object_id() {
        let packet = Packet::ConstructionAmountChanged {
            id: "ABC123".to_string(),
            amount: 0.6,
        };
        assert_eq!(packet.object_id(), Some("ABC123"));
        assert_eq!(packet.kind(), "ConstructionAmountChanged");

        assert_eq!(Packet::Disconnect.object_id(), None);
        assert_eq!(Packet::PlayerLeft { player_id: 3 }.kind(), "PlayerLeft");
    }

    #[test]
    fn test_packet_serialization_amount_changed() {
        let packet = Packet::ConstructionAmountChanged {
            id: "ABC123".to_string(),
            amount: 0.6,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::ConstructionAmountChanged { id, amount } => {
                assert_eq!(id, "ABC123");
                assert_approx_eq!(amount, 0.6, 1e-6);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_world_state() {
        let packet = Packet::WorldState {
            pieces: vec![
                PieceState {
                    id: SpatialSignature::at(1.0, 2.0, 3.0).derive_id(),
                    signature: Some(SpatialSignature::at(1.0, 2.0, 3.0)),
                    amount: 0.25,
                },
                PieceState {
                    id: "ORPHAN".to_string(),
                    signature: None,
                    amount: 1.0,
                },
            ],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        assert!(serialized.len() <= MAX_PACKET_SIZE);
        assert_eq!(deserialized, packet);
    }
}

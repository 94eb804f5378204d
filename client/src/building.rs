//! Construction change observation and remote application
//!
//! Local construct/deconstruct steps are turned into outbound packets here,
//! and packets forwarded by the server are applied to the local mirror.
//!
//! The change observer runs after every amount change, whatever caused it.
//! To keep a remotely applied value from echoing back to the server, the last
//! value exchanged with the server is remembered per id; observing that same
//! value again emits nothing.

use crate::world::{LocalWorld, ObjectHandle};
use log::{debug, info, warn};
use shared::{
    construction_complete, deconstruction_complete, Packet, PieceState, SpatialSignature,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Building {
    world: LocalWorld,
    last_synced: HashMap<String, f32>,
}

// Bitwise so that a NaN applied from the network still counts as seen.
fn same_amount(a: f32, b: f32) -> bool {
    a.to_bits() == b.to_bits()
}

impl Building {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &LocalWorld {
        &self.world
    }

    /// Places a new unbuilt piece and announces it.
    pub fn place(&mut self, signature: SpatialSignature) -> (ObjectHandle, Vec<Packet>) {
        let handle = self.world.spawn(signature);
        let packets = self
            .world
            .identity(handle)
            .map(|id| {
                self.last_synced.insert(id.clone(), 0.0);
                vec![Packet::PiecePlaced { id, signature }]
            })
            .unwrap_or_default();
        (handle, packets)
    }

    /// One local construction step. Amounts are clamped to `[0, 1]` locally.
    pub fn construct(&mut self, handle: ObjectHandle, delta: f32) -> Vec<Packet> {
        let amount = match self.world.get_mut(handle) {
            Some(piece) if !piece.constructed => {
                piece.constructed_amount = (piece.constructed_amount + delta).min(1.0);
                piece.constructed_amount
            }
            _ => return Vec::new(),
        };
        self.local_step(handle, amount)
    }

    /// One local deconstruction step; reopens a finished piece first.
    pub fn deconstruct(&mut self, handle: ObjectHandle, delta: f32) -> Vec<Packet> {
        let amount = match self.world.get_mut(handle) {
            Some(piece) => {
                piece.constructed = false;
                piece.constructed_amount = (piece.constructed_amount - delta).max(0.0);
                piece.constructed_amount
            }
            None => return Vec::new(),
        };
        self.local_step(handle, amount)
    }

    /// A local step that leaves the amount where it was sends no change, but
    /// still finishes a piece sitting at a threshold.
    fn local_step(&mut self, handle: ObjectHandle, amount: f32) -> Vec<Packet> {
        let packets = self.on_construction_amount_changed(handle, amount);
        if !packets.is_empty() {
            return packets;
        }
        self.complete_if_finished(handle, amount).into_iter().collect()
    }

    fn complete_if_finished(&mut self, handle: ObjectHandle, amount: f32) -> Option<Packet> {
        let id = self.world.identity(handle)?;

        if construction_complete(amount) {
            let piece = self.world.get_mut(handle)?;
            if piece.constructed {
                return None;
            }
            piece.constructed = true;
            info!("Construction completed {}", id);
            Some(Packet::ConstructionCompleted { id })
        } else if deconstruction_complete(amount) {
            info!("Deconstruction completed {}", id);
            self.world.destroy(handle);
            self.last_synced.remove(&id);
            Some(Packet::DeconstructionCompleted { id })
        } else {
            None
        }
    }

    /// Observer for construction amount changes on `handle`.
    ///
    /// Emits the change, plus a completion packet the first time a threshold
    /// is crossed. A deconstructed piece is destroyed locally.
    pub fn on_construction_amount_changed(
        &mut self,
        handle: ObjectHandle,
        new_amount: f32,
    ) -> Vec<Packet> {
        let Some(id) = self.world.identity(handle) else {
            return Vec::new();
        };

        if let Some(&last) = self.last_synced.get(&id) {
            if same_amount(last, new_amount) {
                return Vec::new();
            }
        }
        self.last_synced.insert(id.clone(), new_amount);

        let mut packets = vec![Packet::ConstructionAmountChanged {
            id,
            amount: new_amount,
        }];
        packets.extend(self.complete_if_finished(handle, new_amount));
        packets
    }

    /// Applies a packet forwarded by the server. Returns whatever the local
    /// observer produced in response, which is empty for well-formed input.
    pub fn apply_remote(&mut self, packet: &Packet) -> Vec<Packet> {
        match packet {
            Packet::PiecePlaced { id, signature } => {
                self.adopt_piece(id, Some(*signature), None);
                Vec::new()
            }
            Packet::ConstructionAmountChanged { id, amount } => {
                let Some(handle) = self.world.find(id) else {
                    warn!("Construction change for unknown piece {}", id);
                    return Vec::new();
                };
                self.last_synced.insert(id.clone(), *amount);
                if let Some(piece) = self.world.get_mut(handle) {
                    piece.constructed_amount = *amount;
                }
                self.on_construction_amount_changed(handle, *amount)
            }
            Packet::ConstructionCompleted { id } => {
                if let Some(piece) = self.world.find(id).and_then(|h| self.world.get_mut(h)) {
                    piece.constructed_amount = 1.0;
                    piece.constructed = true;
                    self.last_synced.insert(id.clone(), 1.0);
                }
                Vec::new()
            }
            Packet::DeconstructionCompleted { id } => {
                if let Some(handle) = self.world.find(id) {
                    self.world.destroy(handle);
                }
                self.last_synced.remove(id);
                Vec::new()
            }
            Packet::WorldState { pieces } => {
                for PieceState {
                    id,
                    signature,
                    amount,
                } in pieces
                {
                    self.adopt_piece(id, *signature, Some(*amount));
                }
                Vec::new()
            }
            other => {
                debug!("Ignoring {} in world sync", other.kind());
                Vec::new()
            }
        }
    }

    /// Makes sure a piece with the server's `id` exists locally and sets its
    /// amount without observing. A live local piece at the same signature is
    /// moved over to `id` rather than spawned twice. Without `amount` an
    /// existing piece keeps its progress.
    fn adopt_piece(&mut self, id: &str, signature: Option<SpatialSignature>, amount: Option<f32>) {
        let handle = match (self.world.find(id), signature) {
            (Some(handle), _) => handle,
            (None, Some(signature)) => {
                let local_id = signature.derive_id();
                let handle = match self.world.find(&local_id) {
                    Some(handle) => handle,
                    None => self.world.spawn(signature),
                };
                if self.world.adopt_id(handle, id) {
                    debug!("Piece {} adopted canonical id {}", local_id, id);
                    self.last_synced.remove(&local_id);
                }
                handle
            }
            (None, None) => {
                warn!("Cannot spawn piece {} without a signature", id);
                return;
            }
        };

        let Some(piece) = self.world.get_mut(handle) else {
            return;
        };
        if let Some(amount) = amount {
            piece.constructed_amount = amount;
            piece.constructed = construction_complete(amount);
        }
        self.last_synced
            .insert(id.to_string(), piece.constructed_amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn completions(packets: &[Packet]) -> usize {
        packets
            .iter()
            .filter(|p| matches!(p, Packet::ConstructionCompleted { .. }))
            .count()
    }

    #[test]
    fn test_place_announces_piece() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);

        let (_, packets) = building.place(signature);

        assert_eq!(
            packets,
            vec![Packet::PiecePlaced {
                id: signature.derive_id(),
                signature
            }]
        );
    }

    #[test]
    fn test_construct_emits_amount() {
        let mut building = Building::new();
        let (handle, _) = building.place(SpatialSignature::at(1.0, 0.0, 1.0));

        let packets = building.construct(handle, 0.4);

        match packets.as_slice() {
            [Packet::ConstructionAmountChanged { amount, .. }] => {
                assert_approx_eq!(*amount, 0.4, 1e-6)
            }
            other => panic!("Unexpected packets {:?}", other),
        }
    }

    #[test]
    fn test_completion_fires_once() {
        let mut building = Building::new();
        let (handle, _) = building.place(SpatialSignature::at(1.0, 0.0, 1.0));

        let mut sent = Vec::new();
        for _ in 0..8 {
            sent.extend(building.construct(handle, 0.25));
        }

        assert_eq!(completions(&sent), 1);
        assert!(building.world().get(handle).unwrap().constructed);
        // 0.25, 0.5, 0.75, 1.0 then nothing
        assert_eq!(sent.len(), 5);
    }

    #[test]
    fn test_overshoot_clamped_locally() {
        let mut building = Building::new();
        let (handle, _) = building.place(SpatialSignature::at(1.0, 0.0, 1.0));

        building.construct(handle, 0.9);
        let packets = building.construct(handle, 0.5);

        assert_eq!(building.world().get(handle).unwrap().constructed_amount, 1.0);
        assert_eq!(completions(&packets), 1);
    }

    #[test]
    fn test_deconstruction_destroys_piece() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        let (handle, _) = building.place(signature);
        building.construct(handle, 1.0);

        let first = building.deconstruct(handle, 0.5);
        assert_eq!(first.len(), 1);

        let last = building.deconstruct(handle, 0.5);
        assert_eq!(
            last.last(),
            Some(&Packet::DeconstructionCompleted {
                id: signature.derive_id()
            })
        );
        assert!(building.world().is_empty());
        assert!(building.deconstruct(handle, 0.5).is_empty());
    }

    #[test]
    fn test_deconstructing_unbuilt_piece_completes() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        let (handle, _) = building.place(signature);

        let packets = building.deconstruct(handle, 0.5);

        assert_eq!(
            packets,
            vec![Packet::DeconstructionCompleted {
                id: signature.derive_id()
            }]
        );
        assert!(building.world().is_empty());
    }

    #[test]
    fn test_constructing_at_remote_full_amount_completes() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        let (handle, _) = building.place(signature);
        building.apply_remote(&Packet::ConstructionAmountChanged {
            id: signature.derive_id(),
            amount: 1.0,
        });

        let packets = building.construct(handle, 0.1);

        assert_eq!(
            packets,
            vec![Packet::ConstructionCompleted {
                id: signature.derive_id()
            }]
        );
        assert!(building.construct(handle, 0.1).is_empty());
    }

    #[test]
    fn test_remote_change_not_echoed() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        let (handle, _) = building.place(signature);
        let id = signature.derive_id();

        let echo = building.apply_remote(&Packet::ConstructionAmountChanged {
            id: id.clone(),
            amount: 0.6,
        });
        assert!(echo.is_empty());
        assert_approx_eq!(
            building.world().get(handle).unwrap().constructed_amount,
            0.6,
            1e-6
        );

        // The engine reporting the same value again is not a new change
        assert!(building.on_construction_amount_changed(handle, 0.6).is_empty());
    }

    #[test]
    fn test_remote_full_amount_does_not_complete_locally() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        building.place(signature);

        let echo = building.apply_remote(&Packet::ConstructionAmountChanged {
            id: signature.derive_id(),
            amount: 1.0,
        });

        assert!(echo.is_empty());
    }

    #[test]
    fn test_remote_nan_not_echoed() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        building.place(signature);

        let echo = building.apply_remote(&Packet::ConstructionAmountChanged {
            id: signature.derive_id(),
            amount: f32::NAN,
        });

        assert!(echo.is_empty());
    }

    #[test]
    fn test_remote_change_for_unknown_piece() {
        let mut building = Building::new();
        let echo = building.apply_remote(&Packet::ConstructionAmountChanged {
            id: "UNKNOWN".to_string(),
            amount: 0.5,
        });

        assert!(echo.is_empty());
        assert!(building.world().is_empty());
    }

    #[test]
    fn test_remote_placement_adopts_canonical_id() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(8.0, 0.0, 8.0);

        building.apply_remote(&Packet::PiecePlaced {
            id: "CANONICAL".to_string(),
            signature,
        });

        let handle = building.world().find("CANONICAL").unwrap();
        assert_eq!(building.world().find(&signature.derive_id()), None);
        assert_eq!(building.world().get(handle).unwrap().signature, signature);
    }

    #[test]
    fn test_remote_placement_moves_local_piece_to_canonical_id() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(8.0, 0.0, 8.0);
        let (handle, _) = building.place(signature);
        building.construct(handle, 0.4);

        let echo = building.apply_remote(&Packet::PiecePlaced {
            id: "CANONICAL".to_string(),
            signature,
        });

        assert!(echo.is_empty());
        assert_eq!(building.world().len(), 1);
        assert_eq!(building.world().find("CANONICAL"), Some(handle));
        assert_eq!(building.world().find(&signature.derive_id()), None);
        assert_approx_eq!(
            building.world().get(handle).unwrap().constructed_amount,
            0.4,
            1e-6
        );

        // Further progress is reported under the canonical id
        match building.construct(handle, 0.2).as_slice() {
            [Packet::ConstructionAmountChanged { id, .. }] => assert_eq!(id, "CANONICAL"),
            other => panic!("Unexpected packets {:?}", other),
        }
    }

    #[test]
    fn test_remote_placement_reuses_local_piece() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(8.0, 0.0, 8.0);
        let (handle, _) = building.place(signature);

        building.apply_remote(&Packet::PiecePlaced {
            id: signature.derive_id(),
            signature,
        });

        assert_eq!(building.world().len(), 1);
        assert_eq!(building.world().find(&signature.derive_id()), Some(handle));
    }

    #[test]
    fn test_remote_completion_blocks_local_completion() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        let (handle, _) = building.place(signature);

        building.apply_remote(&Packet::ConstructionCompleted {
            id: signature.derive_id(),
        });

        assert!(building.world().get(handle).unwrap().constructed);
        assert!(building.construct(handle, 0.5).is_empty());
    }

    #[test]
    fn test_remote_deconstruction_completed() {
        let mut building = Building::new();
        let signature = SpatialSignature::at(1.0, 0.0, 1.0);
        building.place(signature);

        building.apply_remote(&Packet::DeconstructionCompleted {
            id: signature.derive_id(),
        });

        assert!(building.world().is_empty());
    }

    #[test]
    fn test_world_state_snapshot() {
        let mut building = Building::new();
        let built = SpatialSignature::at(1.0, 0.0, 1.0);
        let partial = SpatialSignature::at(2.0, 0.0, 2.0);

        building.apply_remote(&Packet::WorldState {
            pieces: vec![
                PieceState {
                    id: built.derive_id(),
                    signature: Some(built),
                    amount: 1.0,
                },
                PieceState {
                    id: partial.derive_id(),
                    signature: Some(partial),
                    amount: 0.3,
                },
                PieceState {
                    id: "NO-SIGNATURE".to_string(),
                    signature: None,
                    amount: 0.5,
                },
            ],
        });

        assert_eq!(building.world().len(), 2);
        let built_handle = building.world().find(&built.derive_id()).unwrap();
        let partial_handle = building.world().find(&partial.derive_id()).unwrap();
        assert!(building.world().get(built_handle).unwrap().constructed);
        assert_approx_eq!(
            building.world().get(partial_handle).unwrap().constructed_amount,
            0.3,
            1e-6
        );

        // Continuing a partially built piece sends the new amount
        let packets = building.construct(partial_handle, 0.1);
        assert_eq!(packets.len(), 1);
    }
}

//! Authoritative per-piece construction state
//!
//! The store is the value every participant converges to. It performs no
//! validation: amounts are kept exactly as received, including values outside
//! `[0, 1]` and NaN. Completion thresholds are the caller's business.

use log::debug;
use shared::{PieceState, SpatialSignature};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy)]
struct Piece {
    signature: Option<SpatialSignature>,
    amount: f32,
}

#[derive(Debug, Default)]
pub struct StateStore {
    pieces: Mutex<HashMap<String, Piece>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Piece>> {
        self.pieces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts the construction amount of `id`, last write wins.
    pub fn set_amount(&self, id: &str, amount: f32) {
        let mut pieces = self.lock();
        match pieces.get_mut(id) {
            Some(piece) => piece.amount = amount,
            None => {
                pieces.insert(
                    id.to_string(),
                    Piece {
                        signature: None,
                        amount,
                    },
                );
            }
        }
    }

    pub fn get_amount(&self, id: &str) -> Option<f32> {
        self.lock().get(id).map(|piece| piece.amount)
    }

    /// Records a newly placed piece. A piece that is already known keeps its
    /// amount and only gains the signature.
    pub fn place(&self, id: &str, signature: SpatialSignature) {
        let mut pieces = self.lock();
        let piece = pieces.entry(id.to_string()).or_insert(Piece {
            signature: None,
            amount: 0.0,
        });
        piece.signature = Some(signature);
        debug!("Piece {} placed at {}", id, signature);
    }

    pub fn remove(&self, id: &str) -> Option<f32> {
        self.lock().remove(id).map(|piece| piece.amount)
    }

    pub fn snapshot(&self) -> Vec<PieceState> {
        self.lock()
            .iter()
            .map(|(id, piece)| PieceState {
                id: id.clone(),
                signature: piece.signature,
                amount: piece.amount,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

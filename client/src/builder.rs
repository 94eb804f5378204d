//! Scripted player that builds (or tears down) a single piece
//!
//! Stands in for interactive input: every tick it advances the construction
//! of one piece by a random step, producing the packets a real player's tool
//! use would.

use crate::building::Building;
use crate::world::ObjectHandle;
use log::{info, warn};
use rand::Rng;
use shared::{Packet, SpatialSignature};

#[derive(Debug, Clone, Copy)]
pub struct BuildPlan {
    pub signature: SpatialSignature,
    pub deconstruct: bool,
    pub min_step: f32,
    pub max_step: f32,
}

#[derive(Debug)]
pub struct Builder {
    plan: BuildPlan,
    handle: Option<ObjectHandle>,
    finished: bool,
}

impl Builder {
    pub fn new(plan: BuildPlan) -> Self {
        Self {
            plan,
            handle: None,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn step<R: Rng>(&self, rng: &mut R) -> f32 {
        if self.plan.max_step > self.plan.min_step {
            rng.gen_range(self.plan.min_step..=self.plan.max_step)
        } else {
            self.plan.min_step
        }
    }

    pub fn tick<R: Rng>(&mut self, building: &mut Building, rng: &mut R) -> Vec<Packet> {
        if self.finished {
            return Vec::new();
        }

        let target = self.plan.signature.derive_id();
        let existing = self
            .handle
            .filter(|handle| building.world().get(*handle).is_some())
            .or_else(|| building.world().find(&target));

        let Some(handle) = existing else {
            if self.plan.deconstruct && self.handle.is_none() {
                warn!("No piece at {} to deconstruct", self.plan.signature);
            }
            // Our piece is gone, or there was never one to tear down
            if self.handle.is_some() || self.plan.deconstruct {
                self.finished = true;
                return Vec::new();
            }
            let (handle, packets) = building.place(self.plan.signature);
            info!("Placed piece at {}", self.plan.signature);
            self.handle = Some(handle);
            return packets;
        };
        self.handle = Some(handle);

        let step = self.step(rng);
        if self.plan.deconstruct {
            building.deconstruct(handle, step)
        } else {
            let packets = building.construct(handle, step);
            if building
                .world()
                .get(handle)
                .map_or(true, |piece| piece.constructed)
            {
                self.finished = true;
            }
            packets
        }
    }
}

//! Local mirror of the constructible objects this client knows about
//!
//! The world owns the objects and the session's [`IdentityRegistry`]. Spawning
//! an object attaches its identity, destroying it detaches it, so the
//! registry never outlives the objects it points at.

use log::debug;
use shared::{IdentityRegistry, SpatialSignature};
use std::collections::HashMap;

/// Process-local handle of a world object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Constructable {
    pub signature: SpatialSignature,
    /// Local, non-authoritative copy of the construction amount
    pub constructed_amount: f32,
    pub constructed: bool,
}

#[derive(Debug, Default)]
pub struct LocalWorld {
    objects: HashMap<ObjectHandle, Constructable>,
    registry: IdentityRegistry<ObjectHandle>,
    next_handle: u64,
}

impl LocalWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbuilt object and attaches its derived identity.
    pub fn spawn(&mut self, signature: SpatialSignature) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;

        self.objects.insert(
            handle,
            Constructable {
                signature,
                constructed_amount: 0.0,
                constructed: false,
            },
        );
        let id = self.registry.get_or_create(handle, &signature.to_string());
        debug!("Spawned {:?} as {}", handle, id);

        handle
    }

    pub fn destroy(&mut self, handle: ObjectHandle) -> Option<Constructable> {
        let object = self.objects.remove(&handle)?;
        self.registry.detach(handle);
        Some(object)
    }

    /// Identity of a live object, created on first request.
    pub fn identity(&self, handle: ObjectHandle) -> Option<String> {
        let object = self.objects.get(&handle)?;
        Some(
            self.registry
                .get_or_create(handle, &object.signature.to_string()),
        )
    }

    /// Switches an object over to a server-supplied id.
    pub fn adopt_id(&self, handle: ObjectHandle, id: &str) -> bool {
        self.objects.contains_key(&handle) && self.registry.reassign(handle, id)
    }

    pub fn find(&self, id: &str) -> Option<ObjectHandle> {
        self.registry
            .resolve(id)
            .filter(|handle| self.objects.contains_key(handle))
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&Constructable> {
        self.objects.get(&handle)
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut Constructable> {
        self.objects.get_mut(&handle)
    }

    pub fn registry(&self) -> &IdentityRegistry<ObjectHandle> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

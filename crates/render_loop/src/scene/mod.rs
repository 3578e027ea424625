//! # Scene
//!
//! Arena of scene objects addressed by generational keys. Objects iterate
//! in load order and are released newest-first at teardown.

pub mod object;

pub use object::{Animation, SceneObject, SceneObjectDesc};

use crate::foundation::collections::{new_key_type, OrderedArena};
use crate::render::device::GraphicsDevice;
use crate::render::effects::Technique;

new_key_type! {
    /// Handle to an object in a [`Scene`]
    pub struct SceneObjectKey;
}

/// Owning collection of scene objects
#[derive(Debug, Default)]
pub struct Scene {
    objects: OrderedArena<SceneObjectKey, SceneObject>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an object
    pub fn insert(&mut self, object: SceneObject) -> SceneObjectKey {
        self.objects.insert(object)
    }

    /// Look up an object
    pub fn get(&self, key: SceneObjectKey) -> Option<&SceneObject> {
        self.objects.get(key)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, key: SceneObjectKey) -> Option<&mut SceneObject> {
        self.objects.get_mut(key)
    }

    /// Find the first object with `name`
    pub fn find(&self, name: &str) -> Option<SceneObjectKey> {
        self.objects.iter().find(|(_, o)| o.name() == name).map(|(k, _)| k)
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in load order
    pub fn iter(&self) -> impl Iterator<Item = (SceneObjectKey, &SceneObject)> + '_ {
        self.objects.iter()
    }

    /// Mutable access to every object
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> + '_ {
        self.objects.values_mut()
    }

    /// Objects drawn with `technique`, in load order
    pub fn with_technique(&self, technique: Technique) -> impl Iterator<Item = &SceneObject> + '_ {
        self.objects
            .iter()
            .map(|(_, o)| o)
            .filter(move |o| o.technique() == technique)
    }

    /// Advance every object's animation
    pub fn advance(&mut self, dt: f32) {
        for object in self.iter_mut() {
            object.advance(dt);
        }
    }

    /// Release every mesh newest-first and empty the scene
    ///
    /// Returns the released object names in release order.
    pub fn clear<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Vec<String> {
        self.objects
            .drain_reverse()
            .into_iter()
            .map(|object| {
                device.release_mesh(object.mesh_handle());
                log::debug!("Released scene object {}", object.name());
                object.name().to_string()
            })
            .collect()
    }
}

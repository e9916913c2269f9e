//! Component storage access: the opaque, dynamically-typed data a [`crate::entity::EntityCell`]
//! carries.
//!
//! Dispatch over the erased `dyn Component` is `downcast!`-based. Unlike a message-handler
//! registration scheme, systems here act over queried entity sets rather than reaching
//! individual components via routed messages.

use std::any::Any as StdAny;
use std::ops::{Deref, DerefMut};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use downcast::{downcast, AnySync};

use crate::entity::EntityId;
use crate::key::ComponentKey;
use crate::world::ChangeSink;

/// Data attached to an entity. Holds only data; behavior lives in systems.
pub trait Component: AnySync {
    /// Stable key for this component type. Default impl is sufficient for nearly every
    /// component; override only to alias two Rust types onto the same logical key.
    fn component_key() -> ComponentKey
    where
        Self: Sized,
    {
        ComponentKey::of::<Self>()
    }
}
downcast!(dyn Component);

pub(crate) type ComponentSlot = std::sync::RwLock<Box<dyn Component>>;

pub(crate) fn key_of(comp: &dyn Component) -> ComponentKey {
    ComponentKey::of_val(comp)
}

/// Read-only access to a component, held for the scope of a query or observer callback.
pub struct ComponentRef<'a, C> {
    guard: RwLockReadGuard<'a, Box<dyn Component>>,
    _marker: std::marker::PhantomData<&'a C>,
}

impl<'a, C: Component> ComponentRef<'a, C> {
    pub(crate) fn new(guard: RwLockReadGuard<'a, Box<dyn Component>>) -> Self {
        Self {
            guard,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, C: Component> Deref for ComponentRef<'a, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the caller looked this guard up under `C`'s own `ComponentKey`.
        unsafe { self.guard.downcast_ref().unwrap_unchecked() }
    }
}

/// Mutable access to a component. Carries enough context to forward a property-changed
/// notification to the world's observer dispatcher -- nothing is diffed automatically;
/// callers that want `component_changed` observers to fire call
/// [`ComponentMut::notify_change`] explicitly after mutating through the `DerefMut`.
pub struct ComponentMut<'a, C> {
    guard: RwLockWriteGuard<'a, Box<dyn Component>>,
    entity: EntityId,
    key: ComponentKey,
    sink: &'a ChangeSink,
    _marker: std::marker::PhantomData<&'a mut C>,
}

impl<'a, C: Component> ComponentMut<'a, C> {
    pub(crate) fn new(
        guard: RwLockWriteGuard<'a, Box<dyn Component>>,
        entity: EntityId,
        key: ComponentKey,
        sink: &'a ChangeSink,
    ) -> Self {
        Self {
            guard,
            entity,
            key,
            sink,
            _marker: std::marker::PhantomData,
        }
    }

    /// Forward a `component_changed(entity, component, property, new, old)` event to every
    /// matching observer, deferred to the next tick boundary.
    pub fn notify_change(
        &self,
        property: &'static str,
        old: Box<dyn StdAny + Send>,
        new: Box<dyn StdAny + Send>,
    ) {
        self.sink.notify_changed(self.entity.clone(), self.key, property, old, new);
    }
}

impl<'a, C: Component> Deref for ComponentMut<'a, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        unsafe { self.guard.downcast_ref().unwrap_unchecked() }
    }
}

impl<'a, C: Component> DerefMut for ComponentMut<'a, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.guard.downcast_mut().unwrap_unchecked() }
    }
}

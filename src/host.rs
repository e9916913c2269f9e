//! Abstraction over the surrounding scene-graph / engine.
//!
//! The core's only real dependencies on the host are: a default parent to attach newly
//! spawned entities under, a per-tick clock reading, and a place to queue deferred calls
//! (used to push observer handler invocation past the current mutating call).

/// The three host services the world consumes. A real integration implements this against
/// its own scene-graph; [`NullHost`] is a no-op implementation for headless use and tests.
pub trait Host: Send + Sync {
    /// Path (or other host-defined locator) of the default parent for newly spawned
    /// entities, used when `add_to_tree` is requested and the entity isn't already parented.
    fn default_parent(&self) -> &str;

    /// Queue a callback to run at the host's next safe point (end of frame / next tick).
    /// The core uses this exclusively to defer observer handler invocation.
    fn defer(&self, call: DeferredCall);

    /// Run every call queued since the last flush. Hosts that drive their own per-frame
    /// deferred-call queue call this once per tick after `World::process` returns; `NullHost`
    /// and tests call it directly.
    fn flush_deferred(&self);
}

/// A type-erased deferred callback. Boxed so the world doesn't need to know what a
/// particular host's deferred-call representation looks like.
pub type DeferredCall = Box<dyn FnOnce() + Send>;

/// Headless host: entities attach nowhere, and deferred calls run immediately when flushed
/// rather than waiting on an actual engine frame boundary.
pub struct NullHost {
    queue: crossbeam::channel::Sender<DeferredCall>,
    drain: crossbeam::channel::Receiver<DeferredCall>,
    root: String,
}

impl NullHost {
    pub fn new() -> Self {
        let (queue, drain) = crossbeam::channel::unbounded();
        Self {
            queue,
            drain,
            root: "Entities".to_string(),
        }
    }
}

impl Default for NullHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for NullHost {
    fn default_parent(&self) -> &str {
        &self.root
    }

    fn defer(&self, call: DeferredCall) {
        // unbounded channel: send only fails if the receiver was dropped, which can't
        // happen while `self` (which owns it) is alive.
        let _ = self.queue.send(call);
    }

    fn flush_deferred(&self) {
        for call in self.drain.try_iter() {
            call();
        }
    }
}

/// Marker for whether an entity has already been attached under the host's default parent,
/// used by `add_entity`'s "insert into the node tree only if requested and not already
/// parented" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parentage {
    Unparented,
    Parented,
}

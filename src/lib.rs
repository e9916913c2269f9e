//! A data-oriented entity/component/system world: a cached, indexed query planner, a
//! dependency-ordered system scheduler with optional parallel batch execution, a deferred
//! observer-dispatch pipeline, and a relationship index.
//!
//! Component storage is dynamic and downcast-backed, with a `crossbeam`-channel deferred-update
//! pattern driving observer dispatch; the query planner, scheduler, and observer dispatcher
//! are all built in the same lock-per-field, `&self`-mutation style the `World` uses
//! throughout (see `DESIGN.md` for the full grounding ledger).

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod host;
pub mod index;
pub mod key;
pub mod observer;
pub mod query;
pub mod relationship;
pub mod subsystem;
pub mod system;
pub mod world;

pub mod prelude {
    pub use crate::component::{Component, ComponentMut, ComponentRef};
    pub use crate::config::{SerializationHint, WorldConfig};
    pub use crate::entity::{EntityId, EntitySpec};
    pub use crate::error::{WorldError, WorldResult};
    pub use crate::host::{DeferredCall, Host, NullHost, Parentage};
    pub use crate::key::{ComponentKey, RelationKey};
    pub use crate::observer::{Observer, WorldEvent};
    pub use crate::query::{CacheStats, QueryBuilder};
    pub use crate::relationship::{RelationTarget, Relationship};
    pub use crate::subsystem::Subsystem;
    pub use crate::system::System;
    pub use crate::world::{Query, World};
}

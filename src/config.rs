//! Configuration knobs recognized by the world.

/// Host-supplied configuration, read once at construction and thereafter only through
/// explicit setters -- never mutated implicitly by core operations.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Default parent path for entities added with `add_to_tree = true`.
    pub entity_nodes_root: String,
    /// Default parent path for system host-nodes, if the host models systems as nodes.
    pub system_nodes_root: String,
    /// Bound on the query-builder free-list pool.
    pub pool_size_limit: usize,
    /// Host-owned serialization configuration, read back via `World::serialization_hint`.
    /// `None` until a host calls `with_serialization_hint`.
    pub serialization: Option<SerializationHint>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_nodes_root: "Entities".to_string(),
            system_nodes_root: "Systems".to_string(),
            pool_size_limit: 10,
            serialization: None,
        }
    }
}

impl WorldConfig {
    pub fn with_serialization_hint(mut self, hint: SerializationHint) -> Self {
        self.serialization = Some(hint);
        self
    }
}

/// Marker type the host can use to stash its own serialization configuration.
///
/// The core neither reads nor writes through this beyond holding and handing it back; it
/// exists purely so host code has somewhere conventional to attach a config without the core
/// needing to know its shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerializationHint;

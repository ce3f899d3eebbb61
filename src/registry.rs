use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node kind already registered: {0}")]
    DuplicateKind(String),
    #[error("unknown node kind: {0}")]
    UnknownKind(String),
    #[error("registry is frozen; kinds must be registered before first use")]
    RegistryFrozen,
}

/// Socket types gate which output ports may connect to which input ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    Data,
    Error,
    Trigger,
}

impl SocketType {
    /// Whether an output of this type may feed an input of `input`.
    /// Same type always connects; error outputs may also feed data inputs
    /// so failure branches can rejoin the main path.
    pub fn connects_to(self, input: SocketType) -> bool {
        self == input || matches!((self, input), (SocketType::Error, SocketType::Data))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub key: String,
    pub label: String,
    pub socket: SocketType,
    /// Whether multiple edges may attach to this port.
    #[serde(default)]
    pub multiple: bool,
}

impl PortSpec {
    pub fn data(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            socket: SocketType::Data,
            multiple: false,
        }
    }

    pub fn error(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            socket: SocketType::Error,
            multiple: false,
        }
    }

    pub fn trigger(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            socket: SocketType::Trigger,
            multiple: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Default for Size {
    fn default() -> Self {
        Self { w: 180.0, h: 80.0 }
    }
}

/// Static description of a node kind: how instances look and which
/// connections they accept. Registered once at startup, read-only after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    pub kind: String,
    pub label: String,
    pub category: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub default_size: Size,
    #[serde(default)]
    pub inputs: Vec<PortSpec>,
    #[serde(default)]
    pub outputs: Vec<PortSpec>,
}

impl NodeTypeDescriptor {
    pub fn new(kind: &str, label: &str, category: &str) -> Self {
        Self {
            kind: kind.to_string(),
            label: label.to_string(),
            category: category.to_string(),
            icon: None,
            default_size: Size::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_size(mut self, w: f32, h: f32) -> Self {
        self.default_size = Size { w, h };
        self
    }

    pub fn input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn input_port(&self, key: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.key == key)
    }

    pub fn output_port(&self, key: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.key == key)
    }
}

struct RegistryInner {
    entries: BTreeMap<String, NodeTypeDescriptor>,
    frozen: bool,
}

/// Lookup table of node kind descriptors with an init phase and an explicit
/// freeze. Documents freeze the registry they attach to, so late
/// registrations fail loudly instead of silently depending on load order.
pub struct NodeTypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                entries: BTreeMap::new(),
                frozen: false,
            }),
        }
    }

    pub fn register(&self, descriptor: NodeTypeDescriptor) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.frozen {
            return Err(RegistryError::RegistryFrozen);
        }
        if inner.entries.contains_key(&descriptor.kind) {
            return Err(RegistryError::DuplicateKind(descriptor.kind));
        }
        inner.entries.insert(descriptor.kind.clone(), descriptor);
        Ok(())
    }

    pub fn resolve(&self, kind: &str) -> Result<NodeTypeDescriptor, RegistryError> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .entries
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.keys().cloned().collect()
    }

    /// Kinds grouped by category, for palette-style listings.
    pub fn kinds_by_category(&self) -> BTreeMap<String, Vec<String>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for descriptor in inner.entries.values() {
            grouped
                .entry(descriptor.category.clone())
                .or_default()
                .push(descriptor.kind.clone());
        }
        grouped
    }

    pub fn freeze(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.frozen
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("registry lock poisoned");
        f.debug_struct("NodeTypeRegistry")
            .field("kinds", &inner.entries.keys().collect::<Vec<_>>())
            .field("frozen", &inner.frozen)
            .finish()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<NodeTypeRegistry>> = Lazy::new(|| {
    let registry = NodeTypeRegistry::new();
    crate::nodes::register_builtins(&registry).expect("built-in kinds are unique");
    Arc::new(registry)
});

/// Process-wide registry preloaded with the built-in kinds. Hosts may
/// register additional kinds against it before the first document attaches.
pub fn default_registry() -> Arc<NodeTypeRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> NodeTypeDescriptor {
        NodeTypeDescriptor::new("gateway", "Gateway", "flow")
            .input(PortSpec::data("in", "In"))
            .output(PortSpec::data("out", "Out"))
    }

    #[test]
    fn register_then_resolve_returns_same_descriptor() {
        let registry = NodeTypeRegistry::new();
        registry.register(gateway()).unwrap();
        let resolved = registry.resolve("gateway").unwrap();
        assert_eq!(resolved, gateway());
    }

    #[test]
    fn duplicate_kind_is_rejected() {
        let registry = NodeTypeRegistry::new();
        registry.register(gateway()).unwrap();
        assert_eq!(
            registry.register(gateway()),
            Err(RegistryError::DuplicateKind("gateway".to_string()))
        );
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = NodeTypeRegistry::new();
        assert_eq!(
            registry.resolve("nope"),
            Err(RegistryError::UnknownKind("nope".to_string()))
        );
    }

    #[test]
    fn frozen_registry_rejects_registration() {
        let registry = NodeTypeRegistry::new();
        registry.register(gateway()).unwrap();
        registry.freeze();
        let late = NodeTypeDescriptor::new("late", "Late", "misc");
        assert_eq!(registry.register(late), Err(RegistryError::RegistryFrozen));
        // Resolution still works after the freeze.
        assert!(registry.resolve("gateway").is_ok());
    }

    #[test]
    fn error_socket_feeds_data_input() {
        assert!(SocketType::Error.connects_to(SocketType::Data));
        assert!(SocketType::Data.connects_to(SocketType::Data));
        assert!(!SocketType::Data.connects_to(SocketType::Trigger));
        assert!(!SocketType::Data.connects_to(SocketType::Error));
    }
}

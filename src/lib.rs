pub mod animate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod graph;
pub mod history;
pub mod interact;
pub mod layout;
pub mod layout_dump;
pub mod nodes;
pub mod persist;
pub mod registry;
pub mod render;
pub mod service;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, LayoutDirection, load_config};
pub use graph::{Document, Edge, GraphError, Node};
pub use layout::{LayoutError, LayoutResult, compute_layout};
pub use registry::{NodeTypeRegistry, RegistryError, default_registry};
pub use render::render_svg;
pub use service::{
    DiagramService, EditorError, InlineRunner, Mutation, MutationOutcome, ServiceState,
    ThreadedRunner,
};
pub use theme::Theme;

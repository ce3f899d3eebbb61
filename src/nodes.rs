//! Built-in node kinds. Hosts extend this set through
//! [`NodeTypeRegistry::register`](crate::registry::NodeTypeRegistry::register)
//! before the editor processes its first document.

use crate::registry::{NodeTypeDescriptor, NodeTypeRegistry, PortSpec, RegistryError};

pub const CATEGORY_TRIGGER: &str = "trigger";
pub const CATEGORY_ACTION: &str = "action";
pub const CATEGORY_FLOW: &str = "flow";
pub const CATEGORY_DATA: &str = "data";
pub const CATEGORY_INTEGRATION: &str = "integration";
pub const CATEGORY_TRANSFORM: &str = "transform";
pub const CATEGORY_GENERAL: &str = "general";

pub fn builtin_descriptors() -> Vec<NodeTypeDescriptor> {
    vec![
        NodeTypeDescriptor::new("manual_trigger", "Manual Trigger", CATEGORY_TRIGGER)
            .with_icon("fa-bolt")
            .output(PortSpec::data("out", "Out")),
        NodeTypeDescriptor::new("schedule_trigger", "Schedule", CATEGORY_TRIGGER)
            .with_icon("fa-clock-o")
            .output(PortSpec::data("out", "Out")),
        NodeTypeDescriptor::new("http_request", "HTTP Request", CATEGORY_INTEGRATION)
            .with_icon("fa-globe")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("response", "Response"))
            .output(PortSpec::error("error", "Error")),
        NodeTypeDescriptor::new("if", "If", CATEGORY_FLOW)
            .with_icon("fa-code-branch")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("true", "True"))
            .output(PortSpec::data("false", "False")),
        NodeTypeDescriptor::new("loop", "Loop Over Items", CATEGORY_FLOW)
            .with_icon("fa-repeat")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("done", "Done"))
            .output(PortSpec::data("loop", "Loop")),
        NodeTypeDescriptor::new("merge", "Merge", CATEGORY_FLOW)
            .with_icon("fa-compress")
            .input(PortSpec {
                multiple: true,
                ..PortSpec::data("a", "Input A")
            })
            .input(PortSpec {
                multiple: true,
                ..PortSpec::data("b", "Input B")
            })
            .output(PortSpec::data("result", "Result")),
        NodeTypeDescriptor::new("code", "Code", CATEGORY_TRANSFORM)
            .with_icon("fa-code")
            .input(PortSpec::data("data", "Input"))
            .output(PortSpec::data("result", "Result")),
        NodeTypeDescriptor::new("set_fields", "Set Fields", CATEGORY_DATA)
            .with_icon("fa-pencil")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("result", "Result")),
        NodeTypeDescriptor::new("filter", "Filter", CATEGORY_DATA)
            .with_icon("fa-filter")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("kept", "Kept"))
            .output(PortSpec::data("dropped", "Dropped")),
        NodeTypeDescriptor::new("noop", "Replace Me", CATEGORY_GENERAL)
            .with_icon("fa-circle-o")
            .input(PortSpec::data("data", "Data"))
            .output(PortSpec::data("result", "Result")),
    ]
}

pub fn register_builtins(registry: &NodeTypeRegistry) -> Result<(), RegistryError> {
    for descriptor in builtin_descriptors() {
        registry.register(descriptor)?;
    }
    Ok(())
}

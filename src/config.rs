use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for the rank-based layout pipeline.
///
/// Defaults match the canvas conventions the editor was tuned against:
/// 160px between ranks, 120px between nodes in a rank, components stacked
/// 160px apart with a 50px outer margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub rank_separation: f32,
    pub node_separation: f32,
    pub component_separation: f32,
    pub margin: f32,
    /// Crossing-minimization sweeps over the rank ordering.
    pub ordering_passes: usize,
    /// Wall-clock budget for a single layout computation.
    pub layout_budget_ms: u64,
    /// Extra clearance used when routing back edges around their span.
    pub back_edge_clearance: f32,
    /// Horizontal padding added around measured node labels.
    pub label_padding: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    LeftRight,
    TopDown,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::LeftRight,
            rank_separation: 160.0,
            node_separation: 120.0,
            component_separation: 160.0,
            margin: 50.0,
            ordering_passes: 4,
            layout_budget_ms: 2000,
            back_edge_clearance: 40.0,
            label_padding: 14.0,
        }
    }
}

/// Transition timings for the animator. Durations are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub enter_duration_ms: u64,
    pub exit_duration_ms: u64,
    pub move_duration_ms: u64,
    /// Per-element stagger applied to bulk transitions.
    pub stagger_ms: u64,
    pub enter_scale_from: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enter_duration_ms: 180,
            exit_duration_ms: 120,
            move_duration_ms: 350,
            stagger_ms: 20,
            enter_scale_from: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub port_radius: f32,
    pub node_corner_radius: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            port_radius: 4.0,
            node_corner_radius: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Pointer travel (px) before a press becomes a drag.
    pub drag_threshold: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self { drag_threshold: 4.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub animation: AnimationConfig,
    pub render: RenderConfig,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            animation: AnimationConfig::default(),
            render: RenderConfig::default(),
            theme: Theme::modern(),
        }
    }
}

/// Partial config file shape: every field optional so hosts can override
/// only what they care about.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    theme: Option<String>,
    layout: Option<LayoutOverrides>,
    animation: Option<AnimationOverrides>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutOverrides {
    direction: Option<LayoutDirection>,
    rank_separation: Option<f32>,
    node_separation: Option<f32>,
    component_separation: Option<f32>,
    margin: Option<f32>,
    ordering_passes: Option<usize>,
    layout_budget_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnimationOverrides {
    enter_duration_ms: Option<u64>,
    exit_duration_ms: Option<u64>,
    move_duration_ms: Option<u64>,
    stagger_ms: Option<u64>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = json5::from_str(&contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "contrast" {
            config.theme = Theme::contrast();
        } else if theme_name == "modern" || theme_name == "default" {
            config.theme = Theme::modern();
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.direction {
            config.layout.direction = v;
        }
        if let Some(v) = layout.rank_separation {
            config.layout.rank_separation = v;
        }
        if let Some(v) = layout.node_separation {
            config.layout.node_separation = v;
        }
        if let Some(v) = layout.component_separation {
            config.layout.component_separation = v;
        }
        if let Some(v) = layout.margin {
            config.layout.margin = v;
        }
        if let Some(v) = layout.ordering_passes {
            config.layout.ordering_passes = v;
        }
        if let Some(v) = layout.layout_budget_ms {
            config.layout.layout_budget_ms = v;
        }
    }

    if let Some(animation) = parsed.animation {
        if let Some(v) = animation.enter_duration_ms {
            config.animation.enter_duration_ms = v;
        }
        if let Some(v) = animation.exit_duration_ms {
            config.animation.exit_duration_ms = v;
        }
        if let Some(v) = animation.move_duration_ms {
            config.animation.move_duration_ms = v;
        }
        if let Some(v) = animation.stagger_ms {
            config.animation.stagger_ms = v;
        }
    }

    Ok(config)
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_fill: String,
    pub node_text_color: String,
    pub node_border_color: String,
    pub line_color: String,
    pub back_edge_color: String,
    pub port_fill: String,
    pub edge_label_background: String,
    pub selection_color: String,
    pub background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#F8FAFF".to_string(),
            node_text_color: "#1C2430".to_string(),
            node_border_color: "#C7D2E5".to_string(),
            line_color: "#7A8AA6".to_string(),
            back_edge_color: "#B08A4F".to_string(),
            port_fill: "#5B7CB0".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
            selection_color: "#3B82F6".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn contrast() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_fill: "#FFFFFF".to_string(),
            node_text_color: "#000000".to_string(),
            node_border_color: "#333333".to_string(),
            line_color: "#111111".to_string(),
            back_edge_color: "#8A5A00".to_string(),
            port_fill: "#000000".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
            selection_color: "#0000CC".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}

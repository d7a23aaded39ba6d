//! View components as seen by the plugin runtime.
//!
//! The runtime only knows a component as "metadata + config blob". What a
//! given `type` means, and how its config is shaped, is the rendering layer's
//! business.

use serde::{Deserialize, Serialize};

use crate::de::null_as_default;

// ─────────────────────────────────────────────────────────────────────────────
// Component envelope
// ─────────────────────────────────────────────────────────────────────────────

pub const TYPE_TEXT: &str = "text";
pub const TYPE_LINK: &str = "link";
pub const TYPE_BUTTON_GROUP: &str = "buttonGroup";
pub const TYPE_FLEX_LAYOUT: &str = "flexlayout";

/// A typed, tagged UI element.
///
/// The envelope is a closed shape: keys other than `metadata` and `config`
/// are rejected when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Component {
    pub metadata: ComponentMetadata,
    pub config: serde_json::Value,
}

/// Component metadata. Also a closed shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentMetadata {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
}

impl Component {
    pub fn new(component_type: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            metadata: ComponentMetadata {
                component_type: component_type.into(),
                ..Default::default()
            },
            config,
        }
    }

    /// A plain text component.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(TYPE_TEXT, serde_json::json!({ "value": value.into() }))
    }

    pub fn component_type(&self) -> &str {
        &self.metadata.component_type
    }

    /// Whether this component may appear in a content title.
    pub fn is_title(&self) -> bool {
        matches!(self.component_type(), TYPE_TEXT | TYPE_LINK)
    }

    pub fn is_button_group(&self) -> bool {
        self.component_type() == TYPE_BUTTON_GROUP
    }

    pub fn is_flex_layout(&self) -> bool {
        self.component_type() == TYPE_FLEX_LAYOUT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite shapes used by plugin responses
// ─────────────────────────────────────────────────────────────────────────────

/// A header/content pair shown in a summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySection {
    pub header: String,
    pub content: Component,
}

/// An item placed in a flex layout section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexLayoutItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: i32,
    pub view: Component,
}

/// Health of an object as reported by a plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Ok,
    Warning,
    Error,
}

/// Status summary shown for a single object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSummary {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Component>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: NodeStatus,
}

/// A named tab whose contents is a flex layout component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub name: String,
    pub contents: Component,
}

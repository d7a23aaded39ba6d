//! Plugin contract: metadata, capabilities and handler response shapes.

use serde::{Deserialize, Serialize};

use crate::{Component, FlexLayoutItem, GroupVersionKind, PodSummary, SummarySection, Tab};

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata declared by a plugin. Immutable once the plugin is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// What a plugin can do, and for which resource types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub is_module: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports_printer_config: Vec<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports_printer_status: Vec<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports_printer_items: Vec<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports_object_status: Vec<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports_tab: Vec<GroupVersionKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_names: Vec<String>,
}

impl Capabilities {
    /// The GVK list backing a resource capability. `None` for `ActionNames`.
    pub fn gvks(&self, capability: Capability) -> Option<&[GroupVersionKind]> {
        match capability {
            Capability::PrinterConfig => Some(&self.supports_printer_config),
            Capability::PrinterStatus => Some(&self.supports_printer_status),
            Capability::PrinterItems => Some(&self.supports_printer_items),
            Capability::ObjectStatus => Some(&self.supports_object_status),
            Capability::Tab => Some(&self.supports_tab),
            Capability::ActionNames => None,
        }
    }

    pub(crate) fn gvks_mut(&mut self, capability: Capability) -> Option<&mut Vec<GroupVersionKind>> {
        match capability {
            Capability::PrinterConfig => Some(&mut self.supports_printer_config),
            Capability::PrinterStatus => Some(&mut self.supports_printer_status),
            Capability::PrinterItems => Some(&mut self.supports_printer_items),
            Capability::ObjectStatus => Some(&mut self.supports_object_status),
            Capability::Tab => Some(&mut self.supports_tab),
            Capability::ActionNames => None,
        }
    }

    /// Append GVKs to a resource capability. Ignored for `ActionNames`.
    pub fn extend_gvks(&mut self, capability: Capability, gvks: impl IntoIterator<Item = GroupVersionKind>) {
        if let Some(list) = self.gvks_mut(capability) {
            list.extend(gvks);
        }
    }

    /// Whether the plugin declared `capability` for `gvk`.
    pub fn supports(&self, capability: Capability, gvk: &GroupVersionKind) -> bool {
        self.gvks(capability)
            .is_some_and(|list| list.iter().any(|candidate| candidate == gvk))
    }

    pub fn handles_action(&self, action_name: &str) -> bool {
        self.action_names.iter().any(|name| name == action_name)
    }
}

/// The capability keys a plugin may declare.
///
/// The set is closed; keys outside it are skipped by the loader so newer
/// plugins keep loading on older hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PrinterConfig,
    PrinterStatus,
    PrinterItems,
    ObjectStatus,
    Tab,
    ActionNames,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::PrinterConfig,
        Capability::PrinterStatus,
        Capability::PrinterItems,
        Capability::ObjectStatus,
        Capability::Tab,
        Capability::ActionNames,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|capability| capability.as_key() == key)
    }

    /// Key used in the plugin's `capabilities` object.
    pub fn as_key(self) -> &'static str {
        match self {
            Capability::PrinterConfig => "supportPrinterConfig",
            Capability::PrinterStatus => "supportPrinterStatus",
            Capability::PrinterItems => "supportPrinterItems",
            Capability::ObjectStatus => "supportObjectStatus",
            Capability::Tab => "supportTab",
            Capability::ActionNames => "actionNames",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler responses
// ─────────────────────────────────────────────────────────────────────────────

/// Sections a plugin contributes to an object's summary page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintResponse {
    #[serde(default)]
    pub config: Vec<SummarySection>,
    #[serde(default)]
    pub status: Vec<SummarySection>,
    #[serde(default)]
    pub items: Vec<FlexLayoutItem>,
}

/// A tab a plugin contributes to an object's page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabResponse {
    pub tab: Tab,
}

/// Object status contributed by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatusResponse {
    pub object_status: PodSummary,
}

/// Content a module plugin renders for one of its paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title: Vec<Component>,
    #[serde(default)]
    pub view_components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_group: Option<Component>,
}

/// Arbitrary payload sent along with an action.
pub type ActionPayload = serde_json::Map<String, serde_json::Value>;

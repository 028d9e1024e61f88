use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Whether a frame lives in the document's own scope or inside a shadow tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeScopeType {
    #[default]
    Document,
    Shadow,
}

bitflags! {
    /// Sandbox restrictions applied to a frame by its owner element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SandboxFlags: u32 {
        const NAVIGATION = 1 << 0;
        const PLUGINS = 1 << 1;
        const ORIGIN = 1 << 2;
        const FORMS = 1 << 3;
        const SCRIPTS = 1 << 4;
        const TOP_NAVIGATION = 1 << 5;
        const POPUPS = 1 << 6;
        const AUTOMATIC_FEATURES = 1 << 7;
        const POINTER_LOCK = 1 << 8;
        const DOCUMENT_DOMAIN = 1 << 9;
        const ORIENTATION_LOCK = 1 << 10;
        const PROPAGATES_TO_AUXILIARY_BROWSING_CONTEXTS = 1 << 11;
        const MODALS = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollingMode {
    #[default]
    Auto,
    AlwaysOff,
    AlwaysOn,
}

/// Properties of the element (iframe, frame, object) that owns a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameOwnerProperties {
    #[serde(default)]
    pub scrolling_mode: ScrollingMode,
    #[serde(default = "unset_margin")]
    pub margin_width: i32,
    #[serde(default = "unset_margin")]
    pub margin_height: i32,
}

fn unset_margin() -> i32 {
    -1
}

impl Default for FrameOwnerProperties {
    fn default() -> Self {
        Self {
            scrolling_mode: ScrollingMode::Auto,
            margin_width: unset_margin(),
            margin_height: unset_margin(),
        }
    }
}

/// Everything the announcing process tells us about a new child frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFrame {
    #[serde(default)]
    pub scope: TreeScopeType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sandbox_flags: SandboxFlags,
    #[serde(default)]
    pub owner_properties: FrameOwnerProperties,
}

impl NewFrame {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

use std::time::Instant;

use crate::collaborators::{FrameHostInfo, RenderManager};
use crate::frame::{FrameOwnerProperties, SandboxFlags, TreeScopeType};
use crate::ids::{FrameTreeId, FrameTreeNodeId, SiteInstance};

pub const LOADING_PROGRESS_NOT_STARTED: f64 = 0.0;
pub const LOADING_PROGRESS_MINIMUM: f64 = 0.1;
pub const LOADING_PROGRESS_DONE: f64 = 1.0;

/// One document position in a frame tree. Children are owned by the tree's
/// node table and referenced here by id, in insertion order.
pub struct FrameTreeNode {
    id: FrameTreeNodeId,
    frame_tree: FrameTreeId,
    parent: Option<FrameTreeNodeId>,
    children: Vec<FrameTreeNodeId>,
    depth: usize,
    scope: TreeScopeType,
    frame_name: String,
    sandbox_flags: SandboxFlags,
    owner_properties: FrameOwnerProperties,
    has_started_loading: bool,
    loading_progress: f64,
    last_focus_time: Option<Instant>,
    render_manager: Box<dyn RenderManager>,
}

pub(crate) struct NodeInit {
    pub frame_tree: FrameTreeId,
    pub parent: Option<FrameTreeNodeId>,
    pub depth: usize,
    pub scope: TreeScopeType,
    pub frame_name: String,
    pub sandbox_flags: SandboxFlags,
    pub owner_properties: FrameOwnerProperties,
}

impl FrameTreeNode {
    pub(crate) fn new(
        id: FrameTreeNodeId,
        init: NodeInit,
        render_manager: Box<dyn RenderManager>,
    ) -> Self {
        Self {
            id,
            frame_tree: init.frame_tree,
            parent: init.parent,
            children: Vec::new(),
            depth: init.depth,
            scope: init.scope,
            frame_name: init.frame_name,
            sandbox_flags: init.sandbox_flags,
            owner_properties: init.owner_properties,
            has_started_loading: false,
            loading_progress: LOADING_PROGRESS_NOT_STARTED,
            last_focus_time: None,
            render_manager,
        }
    }

    pub fn id(&self) -> FrameTreeNodeId {
        self.id
    }

    pub fn frame_tree(&self) -> FrameTreeId {
        self.frame_tree
    }

    pub fn parent(&self) -> Option<FrameTreeNodeId> {
        self.parent
    }

    pub fn is_main_frame(&self) -> bool {
        self.parent.is_none()
    }

    pub fn children(&self) -> &[FrameTreeNodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child_at(&self, index: usize) -> Option<FrameTreeNodeId> {
        self.children.get(index).copied()
    }

    /// Distance from the root; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn scope(&self) -> TreeScopeType {
        self.scope
    }

    pub fn frame_name(&self) -> &str {
        &self.frame_name
    }

    pub fn sandbox_flags(&self) -> SandboxFlags {
        self.sandbox_flags
    }

    pub fn owner_properties(&self) -> &FrameOwnerProperties {
        &self.owner_properties
    }

    pub fn has_started_loading(&self) -> bool {
        self.has_started_loading
    }

    pub fn loading_progress(&self) -> f64 {
        self.loading_progress
    }

    /// Stores `progress` clamped to `[0.0, 1.0]`. NaN is ignored.
    pub fn set_loading_progress(&mut self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        self.loading_progress = progress.clamp(LOADING_PROGRESS_NOT_STARTED, LOADING_PROGRESS_DONE);
    }

    pub fn mark_started_loading(&mut self) {
        self.has_started_loading = true;
        self.loading_progress = LOADING_PROGRESS_MINIMUM;
    }

    pub fn reset_loading_progress(&mut self) {
        self.has_started_loading = false;
        self.loading_progress = LOADING_PROGRESS_NOT_STARTED;
    }

    pub fn is_loading(&self) -> bool {
        self.render_manager.is_loading()
    }

    pub fn last_focus_time(&self) -> Option<Instant> {
        self.last_focus_time
    }

    pub(crate) fn did_focus(&mut self) {
        self.last_focus_time = Some(Instant::now());
    }

    pub fn render_manager(&self) -> &dyn RenderManager {
        self.render_manager.as_ref()
    }

    pub fn render_manager_mut(&mut self) -> &mut dyn RenderManager {
        self.render_manager.as_mut()
    }

    pub fn current_site_instance(&self) -> SiteInstance {
        self.render_manager.current_site_instance()
    }

    pub fn current_frame_host(&self) -> FrameHostInfo {
        FrameHostInfo {
            node: self.id,
            site_instance: self.render_manager.current_site_instance(),
            routing_id: self.render_manager.current_routing_id(),
        }
    }

    pub(crate) fn push_child(&mut self, child: FrameTreeNodeId) {
        self.children.push(child);
    }

    /// Returns false when `child` is not a direct child.
    pub(crate) fn remove_child(&mut self, child: FrameTreeNodeId) -> bool {
        match self.children.iter().position(|id| *id == child) {
            Some(index) => {
                self.children.remove(index);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for FrameTreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTreeNode")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("frame_name", &self.frame_name)
            .field("has_started_loading", &self.has_started_loading)
            .field("loading_progress", &self.loading_progress)
            .finish_non_exhaustive()
    }
}

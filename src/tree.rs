use std::collections::{BTreeSet, HashMap, VecDeque};
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::{
    CreateFrameFlags, FrameHostInfo, FrameHostLookup, FrameLocation, FrameRemovedListener,
    FrameTreeDelegate, RenderManagerFactory, RenderViewFactory, RenderViewParams,
};
use crate::config::FrameTreeConfig;
use crate::frame::{FrameOwnerProperties, NewFrame, SandboxFlags, TreeScopeType};
use crate::ids::{
    FrameTreeId, FrameTreeNodeId, ProcessId, RoutingId, SiteInstance, SiteInstanceId,
};
use crate::node::{FrameTreeNode, NodeInit, LOADING_PROGRESS_DONE};
use crate::view_registry::{RenderViewHandle, RenderViewRegistry};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddFrameError {
    #[error("process {actual} may not add frames under a parent rendered by process {expected}")]
    ProcessMismatch {
        expected: ProcessId,
        actual: ProcessId,
    },
    #[error("unknown parent frame {0}")]
    UnknownParent(FrameTreeNodeId),
}

/// Serializable view of a tree, rooted at one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTreeSnapshot {
    pub id: FrameTreeNodeId,
    pub name: String,
    pub site_instance: SiteInstanceId,
    pub process_id: ProcessId,
    pub routing_id: RoutingId,
    pub has_started_loading: bool,
    pub loading_progress: f64,
    pub focused: bool,
    pub children: Vec<FrameTreeSnapshot>,
}

/// The frames of one page: a root document and its nested sub-documents,
/// each of which may be rendered by a different site instance.
///
/// Nodes live in a table owned by the tree; parents list their children by
/// id. Every node in the table is reachable from the root.
pub struct FrameTree {
    id: FrameTreeId,
    config: FrameTreeConfig,
    root: FrameTreeNodeId,
    nodes: HashMap<FrameTreeNodeId, FrameTreeNode>,
    focused_frame_tree_node_id: Option<FrameTreeNodeId>,
    load_progress: f64,
    delegate: Box<dyn FrameTreeDelegate>,
    render_managers: Box<dyn RenderManagerFactory>,
    render_views: RenderViewRegistry,
    on_frame_removed: Option<FrameRemovedListener>,
}

impl FrameTree {
    pub fn new(
        config: FrameTreeConfig,
        delegate: Box<dyn FrameTreeDelegate>,
        mut render_managers: Box<dyn RenderManagerFactory>,
        render_views: Box<dyn RenderViewFactory>,
        root_site_instance: SiteInstance,
        root_routing_id: RoutingId,
    ) -> Self {
        let id = FrameTreeId::next();
        let root = FrameTreeNodeId::next();
        let manager = render_managers.create(id, root, root_site_instance, root_routing_id);
        let root_node = FrameTreeNode::new(
            root,
            NodeInit {
                frame_tree: id,
                parent: None,
                depth: 0,
                // The top-level frame is always in a document scope.
                scope: TreeScopeType::Document,
                frame_name: String::new(),
                sandbox_flags: SandboxFlags::empty(),
                owner_properties: FrameOwnerProperties::default(),
            },
            manager,
        );

        let mut nodes = HashMap::new();
        nodes.insert(root, root_node);

        Self {
            id,
            config,
            root,
            nodes,
            focused_frame_tree_node_id: None,
            load_progress: 0.0,
            delegate,
            render_managers,
            render_views: RenderViewRegistry::new(render_views),
            on_frame_removed: None,
        }
    }

    pub fn id(&self) -> FrameTreeId {
        self.id
    }

    pub fn config(&self) -> &FrameTreeConfig {
        &self.config
    }

    pub fn root(&self) -> &FrameTreeNode {
        &self.nodes[&self.root]
    }

    pub fn root_id(&self) -> FrameTreeNodeId {
        self.root
    }

    pub fn node(&self, id: FrameTreeNodeId) -> Option<&FrameTreeNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: FrameTreeNodeId) -> Option<&mut FrameTreeNode> {
        self.nodes.get_mut(&id)
    }

    /// Number of frames, the root included.
    pub fn frame_count(&self) -> usize {
        self.nodes.len()
    }

    /// Breadth-first iteration from the root, children in insertion order.
    pub fn iter(&self) -> Bfs<'_> {
        self.iter_skipping(None)
    }

    /// Breadth-first iteration that never yields `skip` or its descendants.
    pub fn iter_skipping(&self, skip: Option<FrameTreeNodeId>) -> Bfs<'_> {
        Bfs {
            nodes: &self.nodes,
            queue: VecDeque::from([self.root]),
            skip,
        }
    }

    pub fn for_each<F>(&self, on_node: F)
    where
        F: FnMut(&FrameTreeNode) -> ControlFlow<()>,
    {
        self.for_each_skipping(None, on_node);
    }

    pub fn for_each_skipping<F>(&self, skip: Option<FrameTreeNodeId>, mut on_node: F)
    where
        F: FnMut(&FrameTreeNode) -> ControlFlow<()>,
    {
        for node in self.iter_skipping(skip) {
            if on_node(node).is_break() {
                break;
            }
        }
    }

    /// Like `for_each_skipping`, but the visitor may update per-node state.
    /// Structure (children, parents) cannot change during the walk.
    pub fn for_each_mut<F>(&mut self, skip: Option<FrameTreeNodeId>, mut on_node: F)
    where
        F: FnMut(&mut FrameTreeNode) -> ControlFlow<()>,
    {
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            if skip == Some(id) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if on_node(node).is_break() {
                break;
            }
            queue.extend(node.children().iter().copied());
        }
    }

    pub fn find_by_id(&self, id: FrameTreeNodeId) -> Option<&FrameTreeNode> {
        self.nodes.get(&id)
    }

    /// Resolves a renderer's routing id, checking frame hosts before proxy
    /// hosts. Matches that belong to another tree are ignored.
    pub fn find_by_routing_id(
        &self,
        lookup: &dyn FrameHostLookup,
        process_id: ProcessId,
        routing_id: RoutingId,
    ) -> Option<&FrameTreeNode> {
        let in_this_tree = |location: FrameLocation| {
            if location.frame_tree != self.id {
                return None;
            }
            self.nodes.get(&location.node)
        };

        lookup
            .frame_host(process_id, routing_id)
            .and_then(in_this_tree)
            .or_else(|| lookup.proxy_host(process_id, routing_id).and_then(in_this_tree))
    }

    /// The empty name always names the root.
    pub fn find_by_name(&self, name: &str) -> Option<&FrameTreeNode> {
        if name.is_empty() {
            return Some(self.root());
        }
        self.iter().find(|node| node.frame_name() == name)
    }

    /// Registers a child frame announced by `process_id`. Only the process
    /// currently rendering `parent` may add children under it; the child's
    /// initial empty document shares the parent's site instance.
    pub fn add_frame(
        &mut self,
        parent: FrameTreeNodeId,
        process_id: ProcessId,
        new_routing_id: RoutingId,
        frame: NewFrame,
    ) -> Result<FrameTreeNodeId, AddFrameError> {
        assert_ne!(new_routing_id, RoutingId::NONE, "child frame needs a routing id");

        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(AddFrameError::UnknownParent(parent))?;
        let site_instance = parent_node.current_site_instance();
        if site_instance.process_id != process_id {
            tracing::warn!(
                parent = %parent,
                expected = %site_instance.process_id,
                actual = %process_id,
                "rejecting child frame from a process that does not render its parent"
            );
            return Err(AddFrameError::ProcessMismatch {
                expected: site_instance.process_id,
                actual: process_id,
            });
        }
        let depth = parent_node.depth() + 1;

        let id = FrameTreeNodeId::next();
        let manager = self
            .render_managers
            .create(self.id, id, site_instance, new_routing_id);
        let mut node = FrameTreeNode::new(
            id,
            NodeInit {
                frame_tree: self.id,
                parent: Some(parent),
                depth,
                scope: frame.scope,
                frame_name: frame.name,
                sandbox_flags: frame.sandbox_flags,
                owner_properties: frame.owner_properties,
            },
            manager,
        );
        // The renderer created this frame before announcing it.
        node.render_manager_mut().set_render_frame_created(true);

        self.nodes.insert(id, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.push_child(id);
        }

        tracing::debug!(
            node = %id,
            parent = %parent,
            site_instance = %site_instance.id,
            routing_id = %new_routing_id,
            "added frame"
        );
        Ok(id)
    }

    /// Detaches `node` and destroys its subtree.
    ///
    /// Panics when asked to remove the root: the root only goes away with
    /// the tree itself.
    pub fn remove_frame(&mut self, node: FrameTreeNodeId) {
        let Some(target) = self.nodes.get(&node) else {
            tracing::warn!(node = %node, "remove_frame for a frame that is not in the tree");
            return;
        };
        let Some(parent) = target.parent() else {
            panic!("unexpected remove_frame call for main frame");
        };

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.remove_child(node);
        }

        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(removed) = self.nodes.remove(&id) else {
                continue;
            };
            stack.extend(removed.children().iter().rev().copied());
            self.frame_removed(&removed);
        }

        tracing::debug!(node = %node, parent = %parent, "removed frame");
    }

    fn frame_removed(&mut self, frame: &FrameTreeNode) {
        if self.focused_frame_tree_node_id == Some(frame.id()) {
            self.focused_frame_tree_node_id = None;
        }

        if let Some(listener) = self.on_frame_removed.as_mut() {
            listener(&frame.current_frame_host());
        }
    }

    pub fn set_frame_remove_listener<F>(&mut self, on_frame_removed: F)
    where
        F: FnMut(&FrameHostInfo) + 'static,
    {
        self.on_frame_removed = Some(Box::new(on_frame_removed));
    }

    /// Makes every frame addressable from `site_instance`, in response to
    /// `source` navigating into it. `source`'s subtree is skipped since its
    /// documents are about to be replaced.
    pub fn create_proxies_for_site_instance(
        &mut self,
        source: Option<FrameTreeNodeId>,
        site_instance: SiteInstance,
    ) {
        let source_is_main_frame = source
            .and_then(|id| self.nodes.get(&id))
            .is_some_and(FrameTreeNode::is_main_frame);

        // A main-frame navigation sets up the root's own representation.
        if !source_is_main_frame {
            let existing_view = self.render_views.get(site_instance.id);
            let swapped_out_forbidden = self.config.site_isolation.swapped_out_state_forbidden;
            let root = self.root;
            if let Some(root) = self.nodes.get_mut(&root) {
                let manager = root.render_manager_mut();
                match existing_view {
                    Some(view) => manager.ensure_render_view_initialized(view, site_instance),
                    None if swapped_out_forbidden => {
                        manager.create_render_frame_proxy(site_instance)
                    }
                    None => manager.create_render_frame(
                        site_instance,
                        CreateFrameFlags::SWAPPED_OUT | CreateFrameFlags::HIDDEN,
                    ),
                }
            }
        }

        self.for_each_mut(source, |node| {
            // Frames already in the site instance need no proxy of their own.
            if node.current_site_instance().id != site_instance.id {
                node.render_manager_mut()
                    .create_render_frame_proxy(site_instance);
            }
            ControlFlow::Continue(())
        });

        tracing::debug!(
            source = ?source,
            site_instance = %site_instance.id,
            "created proxies for site instance"
        );
    }

    pub fn main_frame(&self) -> FrameHostInfo {
        self.root().current_frame_host()
    }

    pub fn focused_frame_id(&self) -> Option<FrameTreeNodeId> {
        self.focused_frame_tree_node_id
    }

    pub fn focused_frame(&self) -> Option<&FrameTreeNode> {
        self.focused_frame_tree_node_id
            .and_then(|id| self.find_by_id(id))
    }

    /// Distinct site instances currently rendering any frame of this tree.
    pub fn site_instances(&self) -> BTreeSet<SiteInstanceId> {
        let mut site_instances = BTreeSet::new();
        self.for_each(|node| {
            site_instances.insert(node.current_site_instance().id);
            ControlFlow::Continue(())
        });
        site_instances
    }

    /// Moves frame focus to `node`, as requested by `source`.
    pub fn set_focused_frame(&mut self, node: FrameTreeNodeId, source: SiteInstanceId) {
        if self.focused_frame_tree_node_id == Some(node) {
            return;
        }

        let site_instances = self.site_instances();
        let cross_process_frames_possible =
            self.config.site_isolation.cross_process_frames_possible;
        let Some(focused) = self.nodes.get_mut(&node) else {
            tracing::warn!(node = %node, "set_focused_frame for a frame that is not in the tree");
            return;
        };
        let current = focused.current_site_instance().id;

        // The source already knows about the change, and the node's own site
        // instance is told directly below. Everyone else updates their proxy
        // so blur fires on the old frame and document.activeElement is right.
        for instance in site_instances {
            if instance == source || instance == current {
                continue;
            }
            if !cross_process_frames_possible {
                tracing::warn!(
                    node = %node,
                    site_instance = %instance,
                    "replicating focus across site instances without cross-process frames"
                );
            }
            match focused.render_manager().proxy_for(instance) {
                Some(proxy) => focused.render_manager_mut().send_focus_notification(proxy),
                None => tracing::warn!(
                    node = %node,
                    site_instance = %instance,
                    "no proxy to replicate frame focus to"
                ),
            }
        }

        // Focus requested from another process, e.g. via window.focus().
        if current != source {
            focused.render_manager_mut().focus_current_frame();
        }

        focused.did_focus();
        self.focused_frame_tree_node_id = Some(node);
        self.delegate.did_focus_frame(node);
        tracing::debug!(node = %node, source = %source, "focused frame changed");
    }

    /// Sends page-level focus or blur to the root's proxy in every other
    /// site instance of this tree. Site instances reachable only through
    /// openers outside this tree are not notified.
    pub fn replicate_page_focus(&mut self, is_focused: bool) {
        for instance in self.site_instances() {
            self.set_page_focus(instance, is_focused);
        }
    }

    fn set_page_focus(&mut self, instance: SiteInstanceId, is_focused: bool) {
        let root = self.root;
        let Some(root) = self.nodes.get_mut(&root) else {
            return;
        };
        // The main frame's own site instance handles page focus itself.
        if instance == root.current_site_instance().id {
            return;
        }
        match root.render_manager().proxy_for(instance) {
            Some(proxy) => root.render_manager_mut().send_page_focus(proxy, is_focused),
            None => tracing::warn!(
                site_instance = %instance,
                "no main frame proxy to replicate page focus to"
            ),
        }
    }

    pub fn create_render_view_host(&mut self, params: RenderViewParams) -> RenderViewHandle {
        self.render_views.get_or_create(params)
    }

    pub fn render_view_host(&self, site_instance: SiteInstanceId) -> Option<RenderViewHandle> {
        self.render_views.get(site_instance)
    }

    pub fn add_render_view_host_ref(&mut self, view: RenderViewHandle) {
        self.render_views.add_ref(view);
    }

    pub fn release_render_view_host_ref(&mut self, view: RenderViewHandle) {
        self.render_views.release(view);
    }

    pub fn render_views(&self) -> &RenderViewRegistry {
        &self.render_views
    }

    pub fn load_progress(&self) -> f64 {
        self.load_progress
    }

    /// Recomputes the mean progress of frames that have started loading.
    /// The aggregate never moves backwards until `reset_load_progress`.
    pub fn update_load_progress(&mut self) {
        let mut progress = 0.0;
        let mut frame_count = 0usize;
        self.for_each(|node| {
            if node.has_started_loading() {
                progress += node.loading_progress();
                frame_count += 1;
            }
            ControlFlow::Continue(())
        });

        if frame_count == 0 {
            return;
        }
        progress /= frame_count as f64;

        if progress.is_nan() || progress <= self.load_progress {
            return;
        }
        self.load_progress = progress;
        tracing::trace!(progress, frame_count, "load progress changed");

        self.delegate.did_change_load_progress();
    }

    pub fn reset_load_progress(&mut self) {
        self.for_each_mut(None, |node| {
            node.reset_loading_progress();
            ControlFlow::Continue(())
        });
        self.load_progress = 0.0;
    }

    pub fn is_loading(&self) -> bool {
        self.iter().any(FrameTreeNode::is_loading)
    }

    pub fn did_start_loading(&mut self, node: FrameTreeNodeId, to_different_document: bool) {
        let Some(is_main_frame) = self.nodes.get(&node).map(FrameTreeNode::is_main_frame) else {
            return;
        };
        // A new main document replaces the page and every frame in it.
        if to_different_document && is_main_frame {
            self.reset_load_progress();
        }

        if !self.is_loading() {
            self.delegate.did_start_loading(node, to_different_document);
        }

        if let Some(frame) = self.nodes.get_mut(&node) {
            frame.mark_started_loading();
        }
        self.update_load_progress();

        if let Some(frame) = self.nodes.get_mut(&node) {
            frame.render_manager_mut().on_did_start_loading();
        }
    }

    pub fn did_change_load_progress(&mut self, node: FrameTreeNodeId, progress: f64) {
        if progress.is_nan() {
            tracing::warn!(node = %node, "ignoring NaN load progress");
            return;
        }
        let Some(frame) = self.nodes.get_mut(&node) else {
            return;
        };
        frame.set_loading_progress(progress);
        self.update_load_progress();
    }

    pub fn did_stop_loading(&mut self, node: FrameTreeNodeId) {
        let Some(frame) = self.nodes.get_mut(&node) else {
            return;
        };
        frame.render_manager_mut().on_did_stop_loading();
        self.did_change_load_progress(node, LOADING_PROGRESS_DONE);

        if !self.is_loading() {
            self.delegate.did_stop_loading();
        }
    }

    pub fn snapshot(&self) -> FrameTreeSnapshot {
        self.snapshot_from(self.root)
    }

    fn snapshot_from(&self, id: FrameTreeNodeId) -> FrameTreeSnapshot {
        let node = &self.nodes[&id];
        let host = node.current_frame_host();
        FrameTreeSnapshot {
            id,
            name: node.frame_name().to_string(),
            site_instance: host.site_instance.id,
            process_id: host.site_instance.process_id,
            routing_id: host.routing_id,
            has_started_loading: node.has_started_loading(),
            loading_progress: node.loading_progress(),
            focused: self.focused_frame_tree_node_id == Some(id),
            children: node
                .children()
                .iter()
                .map(|child| self.snapshot_from(*child))
                .collect(),
        }
    }
}

/// Breadth-first walk over a frame tree. See [`FrameTree::iter_skipping`].
pub struct Bfs<'a> {
    nodes: &'a HashMap<FrameTreeNodeId, FrameTreeNode>,
    queue: VecDeque<FrameTreeNodeId>,
    skip: Option<FrameTreeNodeId>,
}

impl<'a> Iterator for Bfs<'a> {
    type Item = &'a FrameTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.queue.pop_front() {
            if self.skip == Some(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            self.queue.extend(node.children().iter().copied());
            return Some(node);
        }
        None
    }
}

//! Contracts the frame tree calls out to. The tree never constructs these
//! itself; they are injected at construction or passed per call.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ids::{
    FrameTreeId, FrameTreeNodeId, ProcessId, RoutingId, SiteInstance, SiteInstanceId,
};
use crate::view_registry::RenderViewHandle;

bitflags! {
    /// How a full frame should be created in a site instance that does not
    /// own the node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CreateFrameFlags: u8 {
        const SWAPPED_OUT = 1 << 0;
        const HIDDEN = 1 << 1;
    }
}

/// A proxy for a node living in a site instance that does not own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyRef {
    pub site_instance: SiteInstanceId,
    pub routing_id: RoutingId,
}

/// Snapshot of a node's currently active representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHostInfo {
    pub node: FrameTreeNodeId,
    pub site_instance: SiteInstance,
    pub routing_id: RoutingId,
}

/// Owns the current and proxy representations of a single node and issues
/// the create/proxy calls to renderer processes.
pub trait RenderManager {
    /// Site instance of the current (active) representation.
    fn current_site_instance(&self) -> SiteInstance;

    fn current_routing_id(&self) -> RoutingId;

    /// Records that the renderer already created the frame it announced.
    fn set_render_frame_created(&mut self, created: bool);

    /// Whether the current document has a load in flight.
    fn is_loading(&self) -> bool;

    /// Creates a full representation of the node in `site_instance`.
    fn create_render_frame(&mut self, site_instance: SiteInstance, flags: CreateFrameFlags);

    /// Creates a proxy for the node in `site_instance`. Implementations must
    /// treat a second request for the same site instance as a no-op.
    fn create_render_frame_proxy(&mut self, site_instance: SiteInstance);

    fn ensure_render_view_initialized(
        &mut self,
        view: RenderViewHandle,
        site_instance: SiteInstance,
    );

    fn proxy_for(&self, site_instance: SiteInstanceId) -> Option<ProxyRef>;

    /// Tells the proxy's process that this node is now the focused frame.
    fn send_focus_notification(&mut self, proxy: ProxyRef);

    fn send_page_focus(&mut self, proxy: ProxyRef, is_focused: bool);

    /// Tells the current representation to take focus.
    fn focus_current_frame(&mut self);

    fn on_did_start_loading(&mut self) {}

    fn on_did_stop_loading(&mut self) {}
}

/// Builds the render manager for a newly created node, whose initial
/// document always lives in `site_instance`.
pub trait RenderManagerFactory {
    fn create(
        &mut self,
        frame_tree: FrameTreeId,
        node: FrameTreeNodeId,
        site_instance: SiteInstance,
        routing_id: RoutingId,
    ) -> Box<dyn RenderManager>;
}

/// Arguments for constructing a shared render view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderViewParams {
    pub site_instance: SiteInstance,
    pub routing_id: RoutingId,
    pub main_frame_routing_id: RoutingId,
    pub swapped_out: bool,
    pub hidden: bool,
}

/// The heavyweight per-(tree, site instance) object shared by every node
/// rendered in that site instance.
pub trait RenderView {
    fn site_instance(&self) -> SiteInstance;

    /// Set by the view's owner once teardown has begun.
    fn is_pending_deletion(&self) -> bool;

    fn shutdown_and_destroy(self: Box<Self>);
}

pub trait RenderViewFactory {
    fn create(&mut self, params: RenderViewParams) -> Box<dyn RenderView>;
}

/// Where a routing id resolved to: a node in some frame tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLocation {
    pub frame_tree: FrameTreeId,
    pub node: FrameTreeNodeId,
}

/// Process-global lookup tables for frame hosts and proxy hosts.
pub trait FrameHostLookup {
    fn frame_host(&self, process_id: ProcessId, routing_id: RoutingId) -> Option<FrameLocation>;

    fn proxy_host(&self, process_id: ProcessId, routing_id: RoutingId) -> Option<FrameLocation>;
}

pub trait FrameTreeDelegate {
    fn did_change_load_progress(&mut self);

    fn did_focus_frame(&mut self, _node: FrameTreeNodeId) {}

    fn did_start_loading(&mut self, _node: FrameTreeNodeId, _to_different_document: bool) {}

    fn did_stop_loading(&mut self) {}
}

pub type FrameRemovedListener = Box<dyn FnMut(&FrameHostInfo)>;

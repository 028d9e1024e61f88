//! In-memory collaborators that record what the frame tree asks of the
//! outside world instead of talking to renderer processes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::collaborators::{
    CreateFrameFlags, FrameHostInfo, FrameHostLookup, FrameLocation, FrameRemovedListener,
    FrameTreeDelegate, ProxyRef, RenderManager, RenderManagerFactory, RenderView,
    RenderViewFactory, RenderViewParams,
};
use crate::ids::{
    FrameTreeId, FrameTreeNodeId, ProcessId, RoutingId, SiteInstance, SiteInstanceId,
};
use crate::view_registry::RenderViewHandle;

const FIRST_SIM_ROUTING_ID: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    RenderFrameCreated {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
    },
    CreateRenderFrame {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
        flags: CreateFrameFlags,
    },
    CreateProxy {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
        routing_id: RoutingId,
    },
    EnsureRenderViewInitialized {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
    },
    /// A proxy was told its frame is now focused.
    SetFocusedFrame {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
        routing_id: RoutingId,
    },
    /// The frame's own renderer was told to take focus.
    Focus {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
    },
    SetPageFocus {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
        routing_id: RoutingId,
        is_focused: bool,
    },
    NavigationCommitted {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
        routing_id: RoutingId,
    },
    LoadProgressChanged,
    FrameFocused {
        node: FrameTreeNodeId,
    },
    DidStartLoading {
        node: FrameTreeNodeId,
        to_different_document: bool,
    },
    DidStopLoading,
    FrameRemoved {
        node: FrameTreeNodeId,
        site_instance: SiteInstanceId,
    },
    RenderViewCreated {
        view: u32,
        site_instance: SiteInstanceId,
    },
    RenderViewShutDown {
        view: u32,
        site_instance: SiteInstanceId,
    },
}

struct SimFrame {
    frame_tree: FrameTreeId,
    current: SiteInstance,
    routing_id: RoutingId,
    created: bool,
    loading: bool,
    proxies: BTreeMap<SiteInstanceId, (ProcessId, RoutingId)>,
}

struct SimViewState {
    site_instance: SiteInstance,
    pending_deletion: bool,
}

struct SimState {
    events: Vec<SimEvent>,
    next_routing_id: i32,
    frames: HashMap<FrameTreeNodeId, SimFrame>,
    frame_hosts: HashMap<(ProcessId, RoutingId), FrameLocation>,
    proxy_hosts: HashMap<(ProcessId, RoutingId), FrameLocation>,
    next_view_id: u32,
    views: HashMap<u32, SimViewState>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_routing_id: FIRST_SIM_ROUTING_ID,
            frames: HashMap::new(),
            frame_hosts: HashMap::new(),
            proxy_hosts: HashMap::new(),
            next_view_id: 1,
            views: HashMap::new(),
        }
    }
}

impl SimState {
    fn allocate_routing_id(&mut self) -> RoutingId {
        let id = RoutingId(self.next_routing_id);
        self.next_routing_id += 1;
        id
    }

    /// Registers a proxy for `node` in `site_instance` unless one exists.
    fn add_proxy(
        &mut self,
        node: FrameTreeNodeId,
        site_instance: SiteInstance,
    ) -> Option<RoutingId> {
        let frame_tree = self.frames.get(&node)?.frame_tree;
        if self.frames[&node].proxies.contains_key(&site_instance.id) {
            return None;
        }
        let routing_id = self.allocate_routing_id();
        self.proxy_hosts.insert(
            (site_instance.process_id, routing_id),
            FrameLocation { frame_tree, node },
        );
        if let Some(frame) = self.frames.get_mut(&node) {
            frame
                .proxies
                .insert(site_instance.id, (site_instance.process_id, routing_id));
        }
        Some(routing_id)
    }
}

/// A pretend browser process: hands out recording collaborators that all
/// share one event log and one set of routing tables.
#[derive(Clone, Default)]
pub struct SimBrowser {
    state: Rc<RefCell<SimState>>,
}

impl SimBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_manager_factory(&self) -> Box<dyn RenderManagerFactory> {
        Box::new(SimRenderManagerFactory {
            state: Rc::clone(&self.state),
        })
    }

    pub fn render_view_factory(&self) -> Box<dyn RenderViewFactory> {
        Box::new(SimRenderViewFactory {
            state: Rc::clone(&self.state),
        })
    }

    pub fn delegate(&self) -> Box<dyn FrameTreeDelegate> {
        Box::new(SimDelegate {
            state: Rc::clone(&self.state),
        })
    }

    pub fn frame_removed_listener(&self) -> FrameRemovedListener {
        let state = Rc::clone(&self.state);
        Box::new(move |host: &FrameHostInfo| {
            state.borrow_mut().events.push(SimEvent::FrameRemoved {
                node: host.node,
                site_instance: host.site_instance.id,
            });
        })
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    pub fn take_events(&self) -> Vec<SimEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    /// Swaps `node`'s current frame into `site_instance`, as a committed
    /// cross-site navigation would. The old frame becomes a proxy in its
    /// previous site instance. Returns false for an unknown node.
    pub fn commit_navigation(&self, node: FrameTreeNodeId, site_instance: SiteInstance) -> bool {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(frame) = state.frames.get(&node) else {
            return false;
        };
        let previous = frame.current;
        let previous_routing_id = frame.routing_id;
        let frame_tree = frame.frame_tree;
        if previous.id == site_instance.id {
            return true;
        }

        state
            .frame_hosts
            .remove(&(previous.process_id, previous_routing_id));
        // The proxy in the destination site instance turns into the frame.
        let replaced_proxy = state
            .frames
            .get_mut(&node)
            .and_then(|frame| frame.proxies.remove(&site_instance.id));
        let routing_id = match replaced_proxy {
            Some((process_id, routing_id)) => {
                state.proxy_hosts.remove(&(process_id, routing_id));
                routing_id
            }
            None => state.allocate_routing_id(),
        };
        state.frame_hosts.insert(
            (site_instance.process_id, routing_id),
            FrameLocation { frame_tree, node },
        );
        if let Some(frame) = state.frames.get_mut(&node) {
            frame.current = site_instance;
            frame.routing_id = routing_id;
        }
        state.add_proxy(node, previous);
        state.events.push(SimEvent::NavigationCommitted {
            node,
            site_instance: site_instance.id,
            routing_id,
        });
        true
    }

    /// Starts teardown of every live view for the site instance.
    pub fn mark_views_pending_deletion(&self, site_instance: SiteInstanceId) {
        for view in self.state.borrow_mut().views.values_mut() {
            if view.site_instance.id == site_instance {
                view.pending_deletion = true;
            }
        }
    }

    pub fn live_view_count(&self) -> usize {
        self.state.borrow().views.len()
    }

    pub fn proxy_sites(&self, node: FrameTreeNodeId) -> Vec<SiteInstanceId> {
        self.state
            .borrow()
            .frames
            .get(&node)
            .map(|frame| frame.proxies.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_frame_created(&self, node: FrameTreeNodeId) -> bool {
        self.state
            .borrow()
            .frames
            .get(&node)
            .is_some_and(|frame| frame.created)
    }
}

impl FrameHostLookup for SimBrowser {
    fn frame_host(&self, process_id: ProcessId, routing_id: RoutingId) -> Option<FrameLocation> {
        self.state
            .borrow()
            .frame_hosts
            .get(&(process_id, routing_id))
            .copied()
    }

    fn proxy_host(&self, process_id: ProcessId, routing_id: RoutingId) -> Option<FrameLocation> {
        self.state
            .borrow()
            .proxy_hosts
            .get(&(process_id, routing_id))
            .copied()
    }
}

struct SimRenderManagerFactory {
    state: Rc<RefCell<SimState>>,
}

impl RenderManagerFactory for SimRenderManagerFactory {
    fn create(
        &mut self,
        frame_tree: FrameTreeId,
        node: FrameTreeNodeId,
        site_instance: SiteInstance,
        routing_id: RoutingId,
    ) -> Box<dyn RenderManager> {
        let mut state = self.state.borrow_mut();
        state.frames.insert(
            node,
            SimFrame {
                frame_tree,
                current: site_instance,
                routing_id,
                created: false,
                loading: false,
                proxies: BTreeMap::new(),
            },
        );
        state.frame_hosts.insert(
            (site_instance.process_id, routing_id),
            FrameLocation { frame_tree, node },
        );
        Box::new(SimRenderManager {
            node,
            state: Rc::clone(&self.state),
        })
    }
}

struct SimRenderManager {
    node: FrameTreeNodeId,
    state: Rc<RefCell<SimState>>,
}

impl SimRenderManager {
    fn record(&self, event: SimEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

impl RenderManager for SimRenderManager {
    fn current_site_instance(&self) -> SiteInstance {
        self.state.borrow().frames[&self.node].current
    }

    fn current_routing_id(&self) -> RoutingId {
        self.state.borrow().frames[&self.node].routing_id
    }

    fn set_render_frame_created(&mut self, created: bool) {
        let site_instance = {
            let mut state = self.state.borrow_mut();
            let Some(frame) = state.frames.get_mut(&self.node) else {
                return;
            };
            frame.created = created;
            frame.current.id
        };
        if created {
            self.record(SimEvent::RenderFrameCreated {
                node: self.node,
                site_instance,
            });
        }
    }

    fn is_loading(&self) -> bool {
        self.state
            .borrow()
            .frames
            .get(&self.node)
            .is_some_and(|frame| frame.loading)
    }

    fn create_render_frame(&mut self, site_instance: SiteInstance, flags: CreateFrameFlags) {
        // A swapped-out frame is addressed through a proxy, like any other
        // placeholder.
        self.state.borrow_mut().add_proxy(self.node, site_instance);
        self.record(SimEvent::CreateRenderFrame {
            node: self.node,
            site_instance: site_instance.id,
            flags,
        });
    }

    fn create_render_frame_proxy(&mut self, site_instance: SiteInstance) {
        let created = self.state.borrow_mut().add_proxy(self.node, site_instance);
        if let Some(routing_id) = created {
            self.record(SimEvent::CreateProxy {
                node: self.node,
                site_instance: site_instance.id,
                routing_id,
            });
        }
    }

    fn ensure_render_view_initialized(
        &mut self,
        _view: RenderViewHandle,
        site_instance: SiteInstance,
    ) {
        self.record(SimEvent::EnsureRenderViewInitialized {
            node: self.node,
            site_instance: site_instance.id,
        });
    }

    fn proxy_for(&self, site_instance: SiteInstanceId) -> Option<ProxyRef> {
        let state = self.state.borrow();
        let (_, routing_id) = *state.frames.get(&self.node)?.proxies.get(&site_instance)?;
        Some(ProxyRef {
            site_instance,
            routing_id,
        })
    }

    fn send_focus_notification(&mut self, proxy: ProxyRef) {
        self.record(SimEvent::SetFocusedFrame {
            node: self.node,
            site_instance: proxy.site_instance,
            routing_id: proxy.routing_id,
        });
    }

    fn send_page_focus(&mut self, proxy: ProxyRef, is_focused: bool) {
        self.record(SimEvent::SetPageFocus {
            node: self.node,
            site_instance: proxy.site_instance,
            routing_id: proxy.routing_id,
            is_focused,
        });
    }

    fn focus_current_frame(&mut self) {
        let site_instance = self.current_site_instance().id;
        self.record(SimEvent::Focus {
            node: self.node,
            site_instance,
        });
    }

    fn on_did_start_loading(&mut self) {
        if let Some(frame) = self.state.borrow_mut().frames.get_mut(&self.node) {
            frame.loading = true;
        }
    }

    fn on_did_stop_loading(&mut self) {
        if let Some(frame) = self.state.borrow_mut().frames.get_mut(&self.node) {
            frame.loading = false;
        }
    }
}

impl Drop for SimRenderManager {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        let Some(frame) = state.frames.remove(&self.node) else {
            return;
        };
        state
            .frame_hosts
            .remove(&(frame.current.process_id, frame.routing_id));
        for key in frame.proxies.values() {
            state.proxy_hosts.remove(key);
        }
    }
}

struct SimRenderViewFactory {
    state: Rc<RefCell<SimState>>,
}

impl RenderViewFactory for SimRenderViewFactory {
    fn create(&mut self, params: RenderViewParams) -> Box<dyn RenderView> {
        let mut state = self.state.borrow_mut();
        let id = state.next_view_id;
        state.next_view_id += 1;
        state.views.insert(
            id,
            SimViewState {
                site_instance: params.site_instance,
                pending_deletion: false,
            },
        );
        state.events.push(SimEvent::RenderViewCreated {
            view: id,
            site_instance: params.site_instance.id,
        });
        Box::new(SimRenderView {
            id,
            site_instance: params.site_instance,
            state: Rc::clone(&self.state),
        })
    }
}

struct SimRenderView {
    id: u32,
    site_instance: SiteInstance,
    state: Rc<RefCell<SimState>>,
}

impl RenderView for SimRenderView {
    fn site_instance(&self) -> SiteInstance {
        self.site_instance
    }

    fn is_pending_deletion(&self) -> bool {
        self.state
            .borrow()
            .views
            .get(&self.id)
            .is_some_and(|view| view.pending_deletion)
    }

    fn shutdown_and_destroy(self: Box<Self>) {
        let mut state = self.state.borrow_mut();
        state.views.remove(&self.id);
        state.events.push(SimEvent::RenderViewShutDown {
            view: self.id,
            site_instance: self.site_instance.id,
        });
    }
}

struct SimDelegate {
    state: Rc<RefCell<SimState>>,
}

impl FrameTreeDelegate for SimDelegate {
    fn did_change_load_progress(&mut self) {
        self.state
            .borrow_mut()
            .events
            .push(SimEvent::LoadProgressChanged);
    }

    fn did_focus_frame(&mut self, node: FrameTreeNodeId) {
        self.state
            .borrow_mut()
            .events
            .push(SimEvent::FrameFocused { node });
    }

    fn did_start_loading(&mut self, node: FrameTreeNodeId, to_different_document: bool) {
        self.state
            .borrow_mut()
            .events
            .push(SimEvent::DidStartLoading {
                node,
                to_different_document,
            });
    }

    fn did_stop_loading(&mut self) {
        self.state.borrow_mut().events.push(SimEvent::DidStopLoading);
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::collaborators::{RenderView, RenderViewFactory, RenderViewParams};
use crate::ids::SiteInstanceId;

/// Identity of one shared render view. Two views created for the same site
/// instance never share a handle, even when one replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderViewHandle {
    site_instance: SiteInstanceId,
    serial: u64,
}

impl RenderViewHandle {
    pub fn site_instance(&self) -> SiteInstanceId {
        self.site_instance
    }
}

struct ViewEntry {
    handle: RenderViewHandle,
    view: Box<dyn RenderView>,
    ref_count: u32,
}

impl ViewEntry {
    /// Returns true when the last reference was dropped.
    fn release(&mut self) -> bool {
        assert!(
            self.ref_count > 0,
            "render view {:?} released with no outstanding references",
            self.handle
        );
        self.ref_count -= 1;
        self.ref_count == 0
    }
}

/// Deduplicates one render view per site instance within a frame tree.
///
/// A view whose owner has started tearing it down must not be handed out
/// again, but nodes still holding references to it will release them later.
/// Such views move to `pending_shutdown`, where they keep their own ref
/// count while a fresh view takes the active slot for the same site
/// instance.
pub struct RenderViewRegistry {
    factory: Box<dyn RenderViewFactory>,
    next_serial: u64,
    active: HashMap<SiteInstanceId, ViewEntry>,
    pending_shutdown: HashMap<SiteInstanceId, Vec<ViewEntry>>,
}

impl RenderViewRegistry {
    pub fn new(factory: Box<dyn RenderViewFactory>) -> Self {
        Self {
            factory,
            next_serial: 1,
            active: HashMap::new(),
            pending_shutdown: HashMap::new(),
        }
    }

    /// Returns the active view for the site instance, creating one if there
    /// is none or the existing one is pending deletion. `params` are ignored
    /// when an existing view is reused.
    pub fn get_or_create(&mut self, params: RenderViewParams) -> RenderViewHandle {
        let site_instance = params.site_instance.id;
        if let Some(entry) = self.active.get(&site_instance) {
            if !entry.view.is_pending_deletion() {
                return entry.handle;
            }
        }

        if let Some(stale) = self.active.remove(&site_instance) {
            tracing::debug!(
                site_instance = %site_instance,
                ref_count = stale.ref_count,
                "render view pending deletion; parking until released"
            );
            self.pending_shutdown
                .entry(site_instance)
                .or_default()
                .push(stale);
        }

        let handle = RenderViewHandle {
            site_instance,
            serial: self.next_serial,
        };
        self.next_serial += 1;

        let view = self.factory.create(params);
        self.active.insert(
            site_instance,
            ViewEntry {
                handle,
                view,
                ref_count: 0,
            },
        );
        tracing::debug!(site_instance = %site_instance, ?handle, "created render view");
        handle
    }

    /// The active view for the site instance, whether or not it is pending
    /// deletion.
    pub fn get(&self, site_instance: SiteInstanceId) -> Option<RenderViewHandle> {
        self.active.get(&site_instance).map(|entry| entry.handle)
    }

    /// Panics unless `handle` is the active view for its site instance.
    pub fn add_ref(&mut self, handle: RenderViewHandle) {
        let entry = self
            .active
            .get_mut(&handle.site_instance)
            .filter(|entry| entry.handle == handle)
            .unwrap_or_else(|| panic!("add_ref on render view {handle:?} that is not active"));
        entry.ref_count += 1;
    }

    /// Drops one reference, shutting the view down when it was the last.
    /// Panics if the handle is in neither table.
    pub fn release(&mut self, handle: RenderViewHandle) {
        let site_instance = handle.site_instance;

        if let Some(entry) = self
            .active
            .get_mut(&site_instance)
            .filter(|entry| entry.handle == handle)
        {
            if entry.release() {
                if let Some(entry) = self.active.remove(&site_instance) {
                    tracing::debug!(?handle, "shutting down active render view");
                    entry.view.shutdown_and_destroy();
                }
            }
            return;
        }

        let pending = self
            .pending_shutdown
            .get_mut(&site_instance)
            .unwrap_or_else(|| panic!("released unknown render view {handle:?}"));
        let index = pending
            .iter()
            .position(|entry| entry.handle == handle)
            .unwrap_or_else(|| panic!("released unknown render view {handle:?}"));

        if pending[index].release() {
            let entry = pending.remove(index);
            if pending.is_empty() {
                self.pending_shutdown.remove(&site_instance);
            }
            tracing::debug!(?handle, "shutting down render view pending deletion");
            entry.view.shutdown_and_destroy();
        }
    }

    /// Outstanding references on a live view, active or pending shutdown.
    pub fn ref_count(&self, handle: RenderViewHandle) -> Option<u32> {
        self.entry(handle).map(|entry| entry.ref_count)
    }

    pub fn view(&self, handle: RenderViewHandle) -> Option<&dyn RenderView> {
        self.entry(handle).map(|entry| entry.view.as_ref())
    }

    pub fn is_active(&self, handle: RenderViewHandle) -> bool {
        self.get(handle.site_instance) == Some(handle)
    }

    pub fn pending_shutdown_count(&self, site_instance: SiteInstanceId) -> usize {
        self.pending_shutdown
            .get(&site_instance)
            .map_or(0, Vec::len)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn entry(&self, handle: RenderViewHandle) -> Option<&ViewEntry> {
        if let Some(entry) = self.active.get(&handle.site_instance) {
            if entry.handle == handle {
                return Some(entry);
            }
        }
        self.pending_shutdown
            .get(&handle.site_instance)?
            .iter()
            .find(|entry| entry.handle == handle)
    }
}

//! Shared render views driven through a frame tree and the simulated
//! browser.
use frametree::collaborators::RenderViewParams;
use frametree::sim::{SimBrowser, SimEvent};
use frametree::{FrameTree, FrameTreeConfig, RoutingId, SiteInstance, SiteInstanceId};

fn new_tree(browser: &SimBrowser) -> FrameTree {
    FrameTree::new(
        FrameTreeConfig::default(),
        browser.delegate(),
        browser.render_manager_factory(),
        browser.render_view_factory(),
        SiteInstance::new(1, 10),
        RoutingId(1),
    )
}

fn params(site_instance: SiteInstance) -> RenderViewParams {
    RenderViewParams {
        site_instance,
        routing_id: RoutingId(100),
        main_frame_routing_id: RoutingId(101),
        swapped_out: false,
        hidden: false,
    }
}

fn shut_down_views(events: &[SimEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|event| match event {
            SimEvent::RenderViewShutDown { view, .. } => Some(*view),
            _ => None,
        })
        .collect()
}

#[test]
fn one_view_per_site_instance() {
    let browser = SimBrowser::new();
    let mut tree = new_tree(&browser);
    let site = SiteInstance::new(2, 20);

    let first = tree.create_render_view_host(params(site));
    let second = tree.create_render_view_host(params(site));
    let other = tree.create_render_view_host(params(SiteInstance::new(3, 30)));

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(browser.live_view_count(), 2);
    assert_eq!(tree.render_view_host(site.id), Some(first));
    assert!(tree.render_view_host(SiteInstanceId(9)).is_none());
}

#[test]
fn last_release_shuts_the_view_down() {
    let browser = SimBrowser::new();
    let mut tree = new_tree(&browser);
    let view = tree.create_render_view_host(params(SiteInstance::new(2, 20)));
    tree.add_render_view_host_ref(view);
    tree.add_render_view_host_ref(view);

    tree.release_render_view_host_ref(view);
    assert_eq!(tree.render_views().ref_count(view), Some(1));
    assert_eq!(browser.live_view_count(), 1);

    tree.release_render_view_host_ref(view);
    assert_eq!(browser.live_view_count(), 0);
    assert!(tree.render_view_host(view.site_instance()).is_none());
    assert_eq!(shut_down_views(&browser.events()).len(), 1);
}

#[test]
fn view_pending_deletion_is_replaced_and_released_independently() {
    let browser = SimBrowser::new();
    let mut tree = new_tree(&browser);
    let site = SiteInstance::new(2, 20);

    let old = tree.create_render_view_host(params(site));
    tree.add_render_view_host_ref(old);
    browser.mark_views_pending_deletion(site.id);

    let new = tree.create_render_view_host(params(site));
    tree.add_render_view_host_ref(new);
    assert_ne!(old, new);
    assert_eq!(tree.render_view_host(site.id), Some(new));
    assert_eq!(tree.render_views().pending_shutdown_count(site.id), 1);
    assert_eq!(browser.live_view_count(), 2);
    browser.take_events();

    // Releasing the parked view must leave the replacement untouched.
    tree.release_render_view_host_ref(old);
    assert_eq!(tree.render_views().pending_shutdown_count(site.id), 0);
    assert!(tree.render_views().is_active(new));
    assert_eq!(tree.render_views().ref_count(new), Some(1));
    assert_eq!(browser.live_view_count(), 1);
    assert_eq!(shut_down_views(&browser.take_events()).len(), 1);

    tree.release_render_view_host_ref(new);
    assert_eq!(browser.live_view_count(), 0);
    assert_eq!(tree.render_views().active_count(), 0);
}

#[test]
fn replacement_can_itself_be_replaced() {
    let browser = SimBrowser::new();
    let mut tree = new_tree(&browser);
    let site = SiteInstance::new(2, 20);

    let first = tree.create_render_view_host(params(site));
    tree.add_render_view_host_ref(first);
    browser.mark_views_pending_deletion(site.id);
    let second = tree.create_render_view_host(params(site));
    tree.add_render_view_host_ref(second);
    browser.mark_views_pending_deletion(site.id);
    let third = tree.create_render_view_host(params(site));

    assert_eq!(tree.render_views().pending_shutdown_count(site.id), 2);
    assert_eq!(tree.render_view_host(site.id), Some(third));

    tree.release_render_view_host_ref(second);
    tree.release_render_view_host_ref(first);
    assert_eq!(tree.render_views().pending_shutdown_count(site.id), 0);
    assert_eq!(browser.live_view_count(), 1);
}

#[test]
#[should_panic(expected = "released unknown render view")]
fn releasing_a_destroyed_view_panics() {
    let browser = SimBrowser::new();
    let mut tree = new_tree(&browser);
    let view = tree.create_render_view_host(params(SiteInstance::new(2, 20)));
    tree.add_render_view_host_ref(view);
    tree.release_render_view_host_ref(view);
    tree.release_render_view_host_ref(view);
}

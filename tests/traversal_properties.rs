/// Property tests over randomly shaped frame trees.
use std::collections::VecDeque;

use frametree::sim::SimBrowser;
use frametree::{
    FrameTree, FrameTreeConfig, FrameTreeNodeId, NewFrame, ProcessId, RoutingId, SiteInstance,
};
use proptest::prelude::*;

/// `parents[i]` is the index of frame `i + 1`'s parent; frame 0 is the root.
fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    (1usize..24).prop_flat_map(|len| (0..len).map(|index| 0..=index).collect::<Vec<_>>())
}

fn build(browser: &SimBrowser, parents: &[usize]) -> (FrameTree, Vec<FrameTreeNodeId>) {
    let mut tree = FrameTree::new(
        FrameTreeConfig::default(),
        browser.delegate(),
        browser.render_manager_factory(),
        browser.render_view_factory(),
        SiteInstance::new(1, 10),
        RoutingId(1),
    );
    let mut ids = vec![tree.root_id()];
    for (index, parent) in parents.iter().enumerate() {
        let id = tree
            .add_frame(
                ids[*parent],
                ProcessId(10),
                RoutingId(index as i32 + 2),
                NewFrame::named(format!("frame-{}", index + 1)),
            )
            .unwrap();
        ids.push(id);
    }
    (tree, ids)
}

/// Breadth-first order over frame indices, computed from the parent list.
fn reference_bfs(parents: &[usize], skip: Option<usize>) -> Vec<usize> {
    let mut children = vec![Vec::new(); parents.len() + 1];
    for (index, parent) in parents.iter().enumerate() {
        children[*parent].push(index + 1);
    }
    let mut order = Vec::new();
    let mut queue = VecDeque::from([0usize]);
    while let Some(index) = queue.pop_front() {
        if Some(index) == skip {
            continue;
        }
        order.push(index);
        queue.extend(children[index].iter().copied());
    }
    order
}

fn is_descendant_or_self(parents: &[usize], mut index: usize, ancestor: usize) -> bool {
    loop {
        if index == ancestor {
            return true;
        }
        if index == 0 {
            return false;
        }
        index = parents[index - 1];
    }
}

#[derive(Debug, Clone)]
enum LoadOp {
    Start(usize),
    Progress(usize, f64),
    Stop(usize),
    Reset,
}

fn load_op(frames: usize) -> impl Strategy<Value = LoadOp> {
    prop_oneof![
        (0..frames).prop_map(LoadOp::Start),
        (0..frames, 0.0f64..=1.0).prop_map(|(index, progress)| LoadOp::Progress(index, progress)),
        (0..frames).prop_map(LoadOp::Stop),
        Just(LoadOp::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn traversal_matches_reference_bfs(parents in shape_strategy()) {
        let browser = SimBrowser::new();
        let (tree, ids) = build(&browser, &parents);

        let expected: Vec<_> = reference_bfs(&parents, None)
            .into_iter()
            .map(|index| ids[index])
            .collect();
        let actual: Vec<_> = tree.iter().map(|node| node.id()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn skipped_subtree_is_never_visited(
        (parents, skip) in shape_strategy()
            .prop_flat_map(|parents| {
                let len = parents.len() + 1;
                (Just(parents), 0..len)
            })
    ) {
        let browser = SimBrowser::new();
        let (tree, ids) = build(&browser, &parents);

        let visited: Vec<_> = tree
            .iter_skipping(Some(ids[skip]))
            .map(|node| ids.iter().position(|id| *id == node.id()).unwrap())
            .collect();
        for index in &visited {
            prop_assert!(!is_descendant_or_self(&parents, *index, skip));
        }
        prop_assert_eq!(visited, reference_bfs(&parents, Some(skip)));
    }

    #[test]
    fn aggregate_progress_is_monotonic_between_resets(
        (parents, ops) in shape_strategy()
            .prop_flat_map(|parents| {
                let frames = parents.len() + 1;
                (Just(parents), prop::collection::vec(load_op(frames), 1..40))
            })
    ) {
        let browser = SimBrowser::new();
        let (mut tree, ids) = build(&browser, &parents);

        for op in ops {
            let before = tree.load_progress();
            match op {
                LoadOp::Start(index) => tree.did_start_loading(ids[index], false),
                LoadOp::Progress(index, progress) => {
                    tree.did_change_load_progress(ids[index], progress)
                }
                LoadOp::Stop(index) => tree.did_stop_loading(ids[index]),
                LoadOp::Reset => {
                    tree.reset_load_progress();
                    prop_assert_eq!(tree.load_progress(), 0.0);
                    continue;
                }
            }
            prop_assert!(tree.load_progress() >= before);
            prop_assert!(tree.load_progress() <= 1.0);
        }
    }
}

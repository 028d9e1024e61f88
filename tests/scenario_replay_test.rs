//! Scenario files loaded from disk and replayed end to end.
use std::fs;

use frametree::scenario::{Scenario, ScenarioError};
use frametree::sim::SimEvent;
use frametree::{FrameTreeConfig, SiteInstanceId};
use tempfile::tempdir;

const CROSS_SITE_PAGE: &str = r#"
root: { site_instance: 1, process: 10 }
steps:
  - add_frame: { parent: "", process: 10, routing_id: 2, name: left }
  - add_frame: { parent: "", process: 10, routing_id: 3, name: right }
  - create_proxies: { source: right, site: { site_instance: 2, process: 20 } }
  - commit_navigation: { frame: right, site: { site_instance: 2, process: 20 } }
  - page_focus: { focused: true }
  - start_loading: { frame: "", to_different_document: true }
  - load_progress: { frame: "", progress: 0.6 }
  - remove_frame: { frame: left }
"#;

#[test]
fn replays_a_scenario_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("page.yaml");
    fs::write(&path, CROSS_SITE_PAGE).unwrap();

    let scenario = Scenario::load(&path).unwrap();
    assert_eq!(scenario.steps.len(), 8);
    let report = scenario.run(FrameTreeConfig::default()).unwrap();

    assert_eq!(report.tree.site_instance, SiteInstanceId(1));
    assert_eq!(report.tree.children.len(), 1);
    let right = &report.tree.children[0];
    assert_eq!(right.name, "right");
    assert_eq!(right.site_instance, SiteInstanceId(2));

    assert!(report.is_loading);
    assert!((report.load_progress - 0.6).abs() < f64::EPSILON);

    let page_focus: Vec<_> = report
        .events
        .iter()
        .filter(|event| matches!(event, SimEvent::SetPageFocus { .. }))
        .collect();
    assert_eq!(page_focus.len(), 1);
    assert!(report
        .events
        .iter()
        .any(|event| matches!(event, SimEvent::FrameRemoved { .. })));
}

#[test]
fn report_serializes_to_json() {
    let scenario = Scenario::parse(CROSS_SITE_PAGE).unwrap();
    let report = scenario.run(FrameTreeConfig::default()).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tree"]["children"][0]["name"], "right");
    assert_eq!(json["events"][0]["event"], "render_frame_created");
}

#[test]
fn missing_scenario_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = Scenario::load(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, ScenarioError::Io(_)));
}

#[test]
fn malformed_scenario_is_a_yaml_error() {
    let err = Scenario::parse("root: [not, a, site]").unwrap_err();
    assert!(matches!(err, ScenarioError::Yaml(_)));
    assert!(err.to_string().starts_with("failed to parse YAML"));
}

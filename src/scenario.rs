//! Scripted replays of inbound frame tree events against the simulated
//! browser, described in YAML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FrameTreeConfig;
use crate::frame::NewFrame;
use crate::ids::{FrameTreeNodeId, ProcessId, RoutingId, SiteInstance, SiteInstanceId};
use crate::sim::{SimBrowser, SimEvent};
use crate::tree::{AddFrameError, FrameTree, FrameTreeSnapshot};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("step {step}: no frame named {name:?}")]
    UnknownFrame { step: usize, name: String },
    #[error("step {step}: the main frame cannot be removed")]
    RemoveMainFrame { step: usize },
    #[error("step {step}: routing id {routing_id} is reserved")]
    InvalidRoutingId { step: usize, routing_id: i32 },
    #[error("step {step}: {source}")]
    AddFrame {
        step: usize,
        #[source]
        source: AddFrameError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRef {
    pub site_instance: i32,
    pub process: i32,
}

impl From<SiteRef> for SiteInstance {
    fn from(site: SiteRef) -> Self {
        SiteInstance::new(site.site_instance, site.process)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub root: SiteRef,
    #[serde(default = "default_root_routing_id")]
    pub root_routing_id: i32,
    /// Each step is a single-key map, e.g. `- remove_frame: { frame: ads }`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

fn default_root_routing_id() -> i32 {
    1
}

/// One inbound event. Frames are referred to by name; the empty name is
/// the main frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AddFrame {
        #[serde(default)]
        parent: String,
        process: i32,
        routing_id: i32,
        #[serde(flatten)]
        frame: NewFrame,
    },
    RemoveFrame {
        frame: String,
    },
    CreateProxies {
        #[serde(default)]
        source: Option<String>,
        site: SiteRef,
    },
    CommitNavigation {
        frame: String,
        site: SiteRef,
    },
    Focus {
        frame: String,
        source_site_instance: i32,
    },
    PageFocus {
        focused: bool,
    },
    StartLoading {
        frame: String,
        #[serde(default)]
        to_different_document: bool,
    },
    LoadProgress {
        frame: String,
        progress: f64,
    },
    StopLoading {
        frame: String,
    },
    ResetLoadProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub tree: FrameTreeSnapshot,
    pub focused: Option<FrameTreeNodeId>,
    pub load_progress: f64,
    pub is_loading: bool,
    pub events: Vec<SimEvent>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn run(&self, config: FrameTreeConfig) -> Result<ScenarioReport, ScenarioError> {
        let browser = SimBrowser::new();
        let mut tree = FrameTree::new(
            config,
            browser.delegate(),
            browser.render_manager_factory(),
            browser.render_view_factory(),
            self.root.into(),
            RoutingId(self.root_routing_id),
        );
        tree.set_frame_remove_listener(browser.frame_removed_listener());

        for (index, step) in self.steps.iter().enumerate() {
            let step_number = index + 1;
            tracing::debug!(step = step_number, ?step, "replaying step");
            apply(&mut tree, &browser, step_number, step)?;
        }

        Ok(ScenarioReport {
            tree: tree.snapshot(),
            focused: tree.focused_frame_id(),
            load_progress: tree.load_progress(),
            is_loading: tree.is_loading(),
            events: browser.events(),
        })
    }
}

fn resolve(tree: &FrameTree, step: usize, name: &str) -> Result<FrameTreeNodeId, ScenarioError> {
    tree.find_by_name(name)
        .map(|node| node.id())
        .ok_or_else(|| ScenarioError::UnknownFrame {
            step,
            name: name.to_string(),
        })
}

fn apply(
    tree: &mut FrameTree,
    browser: &SimBrowser,
    step_number: usize,
    step: &Step,
) -> Result<(), ScenarioError> {
    match step {
        Step::AddFrame {
            parent,
            process,
            routing_id,
            frame,
        } => {
            let parent = resolve(tree, step_number, parent)?;
            if RoutingId(*routing_id) == RoutingId::NONE {
                return Err(ScenarioError::InvalidRoutingId {
                    step: step_number,
                    routing_id: *routing_id,
                });
            }
            tree.add_frame(
                parent,
                ProcessId(*process),
                RoutingId(*routing_id),
                frame.clone(),
            )
            .map_err(|source| ScenarioError::AddFrame {
                step: step_number,
                source,
            })?;
        }
        Step::RemoveFrame { frame } => {
            let node = resolve(tree, step_number, frame)?;
            if node == tree.root_id() {
                return Err(ScenarioError::RemoveMainFrame { step: step_number });
            }
            tree.remove_frame(node);
        }
        Step::CreateProxies { source, site } => {
            let source = source
                .as_deref()
                .map(|name| resolve(tree, step_number, name))
                .transpose()?;
            tree.create_proxies_for_site_instance(source, (*site).into());
        }
        Step::CommitNavigation { frame, site } => {
            let node = resolve(tree, step_number, frame)?;
            browser.commit_navigation(node, (*site).into());
        }
        Step::Focus {
            frame,
            source_site_instance,
        } => {
            let node = resolve(tree, step_number, frame)?;
            tree.set_focused_frame(node, SiteInstanceId(*source_site_instance));
        }
        Step::PageFocus { focused } => tree.replicate_page_focus(*focused),
        Step::StartLoading {
            frame,
            to_different_document,
        } => {
            let node = resolve(tree, step_number, frame)?;
            tree.did_start_loading(node, *to_different_document);
        }
        Step::LoadProgress { frame, progress } => {
            let node = resolve(tree, step_number, frame)?;
            tree.did_change_load_progress(node, *progress);
        }
        Step::StopLoading { frame } => {
            let node = resolve(tree, step_number, frame)?;
            tree.did_stop_loading(node);
        }
        Step::ResetLoadProgress => tree.reset_load_progress(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TreeScopeType;

    const SCENARIO: &str = r#"
root: { site_instance: 1, process: 10 }
steps:
  - add_frame: { parent: "", process: 10, routing_id: 2, name: ads }
  - add_frame: { parent: ads, process: 10, routing_id: 3, name: tracker }
  - create_proxies: { source: ads, site: { site_instance: 2, process: 20 } }
  - commit_navigation: { frame: ads, site: { site_instance: 2, process: 20 } }
  - focus: { frame: ads, source_site_instance: 1 }
  - start_loading: { frame: ads }
  - load_progress: { frame: ads, progress: 0.5 }
  - stop_loading: { frame: ads }
"#;

    #[test]
    fn replays_scenario() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let report = scenario.run(FrameTreeConfig::default()).unwrap();

        assert_eq!(report.tree.children.len(), 1);
        let ads = &report.tree.children[0];
        assert_eq!(ads.name, "ads");
        assert_eq!(ads.site_instance, SiteInstanceId(2));
        assert_eq!(ads.children[0].name, "tracker");
        assert_eq!(report.focused, Some(ads.id));
        assert!(ads.focused);
        assert_eq!(report.load_progress, 1.0);
        assert!(!report.is_loading);
        assert!(report
            .events
            .iter()
            .any(|event| matches!(event, SimEvent::Focus { node, .. } if *node == ads.id)));
    }

    #[test]
    fn unknown_frame_is_reported_with_step() {
        let scenario = Scenario::parse(
            "root: { site_instance: 1, process: 10 }\nsteps:\n  - remove_frame: { frame: nope }\n",
        )
        .unwrap();
        let err = scenario.run(FrameTreeConfig::default()).unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownFrame { step: 1, ref name } if name == "nope"));
    }

    #[test]
    fn mismatched_process_fails_add_frame() {
        let scenario = Scenario::parse(
            "root: { site_instance: 1, process: 10 }\nsteps:\n  - add_frame: { process: 11, routing_id: 2 }\n",
        )
        .unwrap();
        let err = scenario.run(FrameTreeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::AddFrame {
                step: 1,
                source: AddFrameError::ProcessMismatch { .. }
            }
        ));
    }

    #[test]
    fn removing_the_main_frame_is_rejected() {
        let scenario = Scenario::parse(
            "root: { site_instance: 1, process: 10 }\nsteps:\n  - remove_frame: { frame: \"\" }\n",
        )
        .unwrap();
        let err = scenario.run(FrameTreeConfig::default()).unwrap_err();
        assert!(matches!(err, ScenarioError::RemoveMainFrame { step: 1 }));
    }

    #[test]
    fn reserved_routing_id_is_rejected() {
        let scenario = Scenario::parse(
            "root: { site_instance: 1, process: 10 }\nsteps:\n  - add_frame: { process: 10, routing_id: -2 }\n",
        )
        .unwrap();
        let err = scenario.run(FrameTreeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::InvalidRoutingId {
                step: 1,
                routing_id: -2
            }
        ));
    }

    #[test]
    fn parses_flattened_frame_attributes_and_unit_steps() {
        let scenario = Scenario::parse(
            r#"
root: { site_instance: 1, process: 10 }
steps:
  - add_frame: { process: 10, routing_id: 2, name: shadow, scope: shadow }
  - reset_load_progress
"#,
        )
        .unwrap();
        assert_eq!(scenario.steps.len(), 2);
        match &scenario.steps[0] {
            Step::AddFrame { parent, frame, .. } => {
                assert_eq!(parent, "");
                assert_eq!(frame.name, "shadow");
                assert_eq!(frame.scope, TreeScopeType::Shadow);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert_eq!(scenario.steps[1], Step::ResetLoadProgress);
    }
}

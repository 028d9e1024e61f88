// Library exports for embedders and tests

pub mod collaborators;
pub mod config;
pub mod frame;
pub mod ids;
pub mod node;
pub mod scenario;
pub mod sim;
pub mod tree;
pub mod view_registry;

// Re-export commonly used types
pub use config::{FrameTreeConfig, SiteIsolationPolicy};
pub use frame::NewFrame;
pub use ids::{FrameTreeNodeId, ProcessId, RoutingId, SiteInstance, SiteInstanceId};
pub use node::FrameTreeNode;
pub use tree::{AddFrameError, FrameTree, FrameTreeSnapshot};
pub use view_registry::{RenderViewHandle, RenderViewRegistry};

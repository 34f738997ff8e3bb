//! Research Tools
//!
//! Tools give researcher sub-agents access to the outside world.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - `Tool` trait, `ToolInvoker` seam and registry
//! - [`search`](crate::tools::search) - Web search and page fetch (daedra / DuckDuckGo)
//! - [`think`](crate::tools::think) - Reflection tool, scheduled apart from other calls
//!
//! # Tool Registry
//!
//! ```ignore
//! let registry = ToolRegistry::with_default_tools();
//! let definitions = registry.definitions();
//! let result = registry.invoke("web_search", json!({"query": "rust async"})).await?;
//! ```

/// Tool registry and invocation interface.
pub mod registry;
/// Web search tools using DuckDuckGo.
pub mod search;
/// Reflection tool.
pub mod think;

pub use registry::{Tool, ToolInvoker, ToolRegistry};

//! Retrieval-mode gating.
//!
//! Total functions over caller-supplied capability flags that decide which
//! retrieval path runs.

use serde::{Deserialize, Serialize};

/// Retrieval mode used when the chat model cannot run the search tool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrievalMode {
    Vector,
    TwoPass,
}

/// Path a single retrieval call takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalRoute {
    /// Search is off; nothing is retrieved
    Disabled,
    /// The model runs the backend-native search tool
    ToolBased,
    /// A secondary model runs the search tool, with a vector fallback
    TwoPass,
    /// Direct similarity search
    Vector,
}

/// Caller capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateFlags {
    pub search_enabled: bool,
    pub model_supports_tools: bool,
    pub two_pass_enabled: bool,
}

impl GateFlags {
    pub fn new(search_enabled: bool, model_supports_tools: bool, two_pass_enabled: bool) -> Self {
        Self {
            search_enabled,
            model_supports_tools,
            two_pass_enabled,
        }
    }
}

/// `TwoPass` iff the two-pass toggle is on.
pub fn select_mode(two_pass_enabled: bool) -> RetrievalMode {
    if two_pass_enabled {
        RetrievalMode::TwoPass
    } else {
        RetrievalMode::Vector
    }
}

pub fn should_enable_tool_based_search(search_enabled: bool, model_supports_tools: bool) -> bool {
    search_enabled && model_supports_tools
}

pub fn should_use_fallback_retrieval(search_enabled: bool, model_supports_tools: bool) -> bool {
    search_enabled && !model_supports_tools
}

/// Combine the predicates into the route a retrieval call takes.
pub fn route(flags: GateFlags) -> RetrievalRoute {
    if should_enable_tool_based_search(flags.search_enabled, flags.model_supports_tools) {
        return RetrievalRoute::ToolBased;
    }

    if should_use_fallback_retrieval(flags.search_enabled, flags.model_supports_tools) {
        return match select_mode(flags.two_pass_enabled) {
            RetrievalMode::TwoPass => RetrievalRoute::TwoPass,
            RetrievalMode::Vector => RetrievalRoute::Vector,
        };
    }

    RetrievalRoute::Disabled
}

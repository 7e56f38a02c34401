//! Progress events emitted while the pipeline builds and answers.

use serde::{Deserialize, Serialize};

/// Broadcast notifications for observing pipeline progress without
/// coupling consumers to the logging setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    BuildStarted,
    DocumentsLoaded { count: usize },
    ChunksCreated { count: usize },
    HierarchyBuilt { nodes: usize },
    IndexReady { reused: bool },
    AnswerProduced { cached: bool },
}

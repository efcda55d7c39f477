use thiserror::Error;

/// Rejections raised by strict tree insertion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("parent `{0}` does not exist in the node map")]
    UnknownParent(String),
    #[error("node `{0}` already exists in the node map")]
    DuplicateNode(String),
    #[error("attaching `{child}` under `{parent}` would make it its own ancestor")]
    Cycle { child: String, parent: String },
    #[error("node `{0}` does not exist in the node map")]
    UnknownNode(String),
}

/// Failures surfaced by slash-command handling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command /{0} is not available")]
    Unavailable(String),
    #[error("command /{command} failed: {message}")]
    Failed { command: String, message: String },
}

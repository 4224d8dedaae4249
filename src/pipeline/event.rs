// ABOUTME: Pipeline triggers such as commits and tags
// ABOUTME: An event carries match filters and the arguments it makes available up front

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::argument::Argument;
use super::known;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Commit,
    GitTag,
    PullRequest,
    Manual,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Commit => write!(f, "commit"),
            EventKind::GitTag => write!(f, "tag"),
            EventKind::PullRequest => write!(f, "pull_request"),
            EventKind::Manual => write!(f, "manual"),
        }
    }
}

/// A trigger attached to a pipeline. The arguments in `provides` are treated
/// as root arguments of that pipeline when its edges are built.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub filters: BTreeMap<String, String>,
    pub provides: Vec<Argument>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            filters: BTreeMap::new(),
            provides: Vec::new(),
        }
    }

    pub fn commit() -> Self {
        Self::new(EventKind::Commit).with_provides([
            known::commit_sha(),
            known::commit_ref(),
            known::branch(),
            known::remote_url(),
        ])
    }

    pub fn git_tag() -> Self {
        Self::new(EventKind::GitTag).with_provides([
            known::tag(),
            known::commit_sha(),
            known::remote_url(),
        ])
    }

    pub fn pull_request() -> Self {
        Self::new(EventKind::PullRequest).with_provides([
            known::commit_sha(),
            known::commit_ref(),
            known::branch(),
            known::remote_url(),
        ])
    }

    pub fn manual() -> Self {
        Self::new(EventKind::Manual)
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.filters.insert(key.into(), value.to_string());
        self
    }

    pub fn with_provides(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.provides.extend(args);
        self
    }

    /// True when every filter is present in `attributes` with an equal value.
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        self.filters
            .iter()
            .all(|(key, value)| attributes.get(key) == Some(value))
    }
}

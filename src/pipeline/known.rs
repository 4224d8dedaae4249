// ABOUTME: Well-known arguments injected by clients and events before any step runs
// ABOUTME: Source checkout, working directory, build identifier and git metadata

use super::argument::Argument;

/// Path to the checked-out source tree.
pub fn source() -> Argument {
    Argument::unpackaged_dir("source")
}

pub fn workdir() -> Argument {
    Argument::string("workdir")
}

pub fn build_id() -> Argument {
    Argument::string("build-id")
}

pub fn commit_sha() -> Argument {
    Argument::string("commit-sha")
}

pub fn commit_ref() -> Argument {
    Argument::string("commit-ref")
}

pub fn branch() -> Argument {
    Argument::string("branch")
}

pub fn remote_url() -> Argument {
    Argument::string("remote-url")
}

pub fn tag() -> Argument {
    Argument::string("tag")
}

pub fn pipeline_name() -> Argument {
    Argument::string("pipeline-name")
}

/// Arguments every client makes available as root arguments.
pub fn defaults() -> Vec<Argument> {
    vec![source(), workdir(), build_id()]
}

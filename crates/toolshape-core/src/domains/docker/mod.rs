//! Docker and Docker Compose.
//!
//! # Modules
//!
//! - [`args`]: guarded argv builders (`run`, `ps`, `images`, `pull`, `compose`)
//! - [`ps`]: `docker ps` containers with port bindings
//! - [`images`]: `docker images` with sizes in bytes
//! - [`compose`]: `docker compose up/down` lifecycle logs
//! - [`pull`]: `docker pull` progress and digest
//! - [`run`]: `docker run -d` container id

use std::sync::LazyLock;

use crate::classify::Classifier;

pub mod args;
pub mod compose;
pub mod images;
pub mod ps;
pub mod pull;
pub mod run;

pub use args::{ComposeArgs, RunArgs};
pub use compose::{
    parse_compose, ComposeAction, ComposeContext, ComposeEntity, ComposePhase, ComposeResult, EntityKind,
};
pub use images::{parse_images, DockerImages, Image};
pub use ps::{parse_ports, parse_ps, Container, ContainerState, DockerPs, PortBinding};
pub use pull::{parse_pull, DockerPull, LayerPhase};
pub use run::{parse_run, DockerRun};

crate::error_kinds! {
    /// Failure categories shared by every docker action.
    pub enum DockerErrorKind {
        DaemonUnreachable => "daemon-unreachable",
        PermissionDenied => "permission-denied",
        PortInUse => "port-in-use",
        Conflict => "conflict",
        ContainerNotFound => "container-not-found",
        ImageNotFound => "image-not-found",
        Unknown => "unknown",
    }
}

/// Docker error rules in priority order.
///
/// Socket permission errors mention the daemon, so they come before the
/// generic daemon-unreachable rule.
pub static DOCKER_ERRORS: LazyLock<Classifier<DockerErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .contains("permission denied while trying to connect", DockerErrorKind::PermissionDenied)
        .contains("cannot connect to the docker daemon", DockerErrorKind::DaemonUnreachable)
        .contains("is the docker daemon running", DockerErrorKind::DaemonUnreachable)
        .contains("port is already allocated", DockerErrorKind::PortInUse)
        .contains("address already in use", DockerErrorKind::PortInUse)
        .contains("is already in use by container", DockerErrorKind::Conflict)
        .pattern(r"\bconflict\b", DockerErrorKind::Conflict)
        .contains("no such container", DockerErrorKind::ContainerNotFound)
        .pattern(
            r"pull access denied|manifest unknown|manifest for \S+ not found|no such image|repository does not exist|unable to find image",
            DockerErrorKind::ImageNotFound,
        )
        .contains("permission denied", DockerErrorKind::PermissionDenied)
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_priorities() {
        let cases = [
            (
                "permission denied while trying to connect to the Docker daemon socket",
                DockerErrorKind::PermissionDenied,
            ),
            (
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
                DockerErrorKind::DaemonUnreachable,
            ),
            (
                "Bind for 0.0.0.0:8080 failed: port is already allocated",
                DockerErrorKind::PortInUse,
            ),
            (
                "Conflict. The container name \"/web\" is already in use by container \"abc\"",
                DockerErrorKind::Conflict,
            ),
            ("Error: No such container: web", DockerErrorKind::ContainerNotFound),
            (
                "pull access denied for nope, repository does not exist or may require 'docker login'",
                DockerErrorKind::ImageNotFound,
            ),
            ("manifest for nginx:nope not found: manifest unknown", DockerErrorKind::ImageNotFound),
            ("something odd", DockerErrorKind::Unknown),
        ];
        for (text, expected) in cases {
            assert_eq!(DOCKER_ERRORS.classify(text), expected, "{text}");
        }
    }
}

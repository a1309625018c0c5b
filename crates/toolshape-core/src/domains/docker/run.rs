//! `docker run -d` container id.

use serde::Serialize;

use super::{DockerErrorKind, DOCKER_ERRORS};
use crate::ident::{full_digest, is_hex, short_id};
use crate::outcome::Outcome;
use crate::present::Present;
use crate::raw::RawInvocation;

/// Result of a detached `docker run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerRun {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_id: Option<String>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Docker had to pull the image before starting it.
    pub pulled_image: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerRunCompact {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    /// Short id; the 64-hex form stays in the full result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pulled_image: bool,
}

/// Parse `docker run -d` output. The container id is the last hex line on stdout;
/// pull progress for a missing image goes to stderr and is ignored.
pub fn parse_run(raw: &RawInvocation, image: &str, name: Option<&str>) -> DockerRun {
    let full = raw
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.len() >= 12 && is_hex(line))
        .last()
        .map(full_digest);

    DockerRun {
        outcome: Outcome::from_invocation(raw, &DOCKER_ERRORS),
        id: full.as_deref().map(short_id),
        full_id: full,
        image: image.to_string(),
        name: name.map(str::to_string),
        pulled_image: raw.stderr.contains("Unable to find image"),
    }
}

impl Present for DockerRun {
    type Compact = DockerRunCompact;

    fn format_full(&self) -> String {
        let mut out = format!("docker run {}: {}\n", self.image, self.outcome.headline());
        if let Some(id) = &self.full_id {
            out.push_str(&format!("container: {id}\n"));
        }
        if let Some(name) = &self.name {
            out.push_str(&format!("name: {name}\n"));
        }
        if self.pulled_image {
            out.push_str("image was pulled before start\n");
        }
        out
    }

    fn project_compact(&self) -> DockerRunCompact {
        DockerRunCompact {
            outcome: self.outcome.clone(),
            id: self.id.clone(),
            image: self.image.clone(),
            name: self.name.clone(),
            pulled_image: self.pulled_image,
        }
    }

    fn format_compact(compact: &DockerRunCompact) -> String {
        match (&compact.outcome, &compact.id) {
            (Outcome::Succeeded, Some(id)) => format!(
                "started {id}{} ({}{})\n",
                compact.name.as_deref().map(|n| format!(" as {n}")).unwrap_or_default(),
                compact.image,
                if compact.pulled_image { ", pulled" } else { "" }
            ),
            (outcome, _) => format!("run {}: {}\n", compact.image, outcome.headline()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "4f66ad9a0b2e6a0c9f9f2c8b3f8e3d4c5b6a7980f1e2d3c4b5a69788796a5b4c";

    #[test]
    fn test_container_id_extracted() {
        let stderr = "Unable to find image 'redis:7' locally\n7: Pulling from library/redis\nStatus: Downloaded newer image for redis:7\n";
        let raw = RawInvocation::new(format!("{ID}\n"), stderr, 0);
        let result = parse_run(&raw, "redis:7", Some("cache"));
        assert!(result.outcome.is_success());
        assert_eq!(result.id.as_deref(), Some("4f66ad9a0b2e"));
        assert_eq!(result.full_id.as_deref(), Some(ID));
        assert!(result.pulled_image);
        assert_eq!(
            DockerRun::format_compact(&result.project_compact()),
            "started 4f66ad9a0b2e as cache (redis:7, pulled)\n"
        );
    }

    #[test]
    fn test_name_conflict() {
        let stderr = "docker: Error response from daemon: Conflict. The container name \"/cache\" is already in use by container \"abc\".";
        let result = parse_run(&RawInvocation::new("", stderr, 125), "redis:7", Some("cache"));
        assert_eq!(result.outcome.kind(), Some(DockerErrorKind::Conflict));
        assert!(result.id.is_none());
    }

    #[test]
    fn test_created_but_failed_to_start_keeps_id() {
        let stderr = "docker: Error response from daemon: driver failed programming external connectivity on endpoint web: Bind for 0.0.0.0:80 failed: port is already allocated.";
        let result = parse_run(&RawInvocation::new(format!("{ID}\n"), stderr, 125), "nginx", None);
        assert_eq!(result.outcome.kind(), Some(DockerErrorKind::PortInUse));
        assert_eq!(result.id.as_deref(), Some("4f66ad9a0b2e"));
    }
}

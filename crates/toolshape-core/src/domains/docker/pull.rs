//! `docker pull` progress and digest.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{DockerErrorKind, DOCKER_ERRORS};
use crate::extract::{scan_lines, LineRule};
use crate::ident::{full_digest, short_id};
use crate::outcome::Outcome;
use crate::phase::reduce_phases;
use crate::present::Present;
use crate::raw::RawInvocation;

/// Layer download phase, ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerPhase {
    Waiting,
    PullingFsLayer,
    Downloading,
    VerifyingChecksum,
    DownloadComplete,
    Extracting,
    PullComplete,
    AlreadyExists,
}

impl LayerPhase {
    fn from_status(status: &str) -> Option<Self> {
        let status = status.trim().to_ascii_lowercase();
        let phase = if status.starts_with("waiting") {
            Self::Waiting
        } else if status.starts_with("pulling fs layer") {
            Self::PullingFsLayer
        } else if status.starts_with("downloading") || status.starts_with("retrying") {
            Self::Downloading
        } else if status.starts_with("verifying checksum") {
            Self::VerifyingChecksum
        } else if status.starts_with("download complete") {
            Self::DownloadComplete
        } else if status.starts_with("extracting") {
            Self::Extracting
        } else if status.starts_with("pull complete") {
            Self::PullComplete
        } else if status.starts_with("already exists") {
            Self::AlreadyExists
        } else {
            return None;
        };
        Some(phase)
    }

    /// Whether the layer is present locally.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::PullComplete | Self::AlreadyExists)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub phase: LayerPhase,
}

/// Result of `docker pull`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerPull {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_full: Option<String>,
    pub up_to_date: bool,
    pub layers: Vec<Layer>,
    pub layer_count: usize,
    /// Layers that were already present before the pull.
    pub cached_layers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerPullCompact {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub image: String,
    /// Short digest; the `sha256:` form stays in the full result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub up_to_date: bool,
    pub layer_count: usize,
    pub cached_layers: usize,
}

static LAYER_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([0-9a-f]{12,64}):\s+(.+)$").ok());

static STATUS_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^Status:\s+(?:Downloaded newer image|Image is up to date) for (\S+)").ok()
});

#[derive(Default)]
struct Accumulator {
    layers: Vec<(String, LayerPhase)>,
    digest: Option<String>,
    image: Option<String>,
    up_to_date: bool,
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "digest",
        apply: digest_line,
    },
    LineRule {
        name: "status",
        apply: status_line,
    },
    LineRule {
        name: "layer",
        apply: layer_line,
    },
    LineRule {
        name: "reference",
        apply: reference_line,
    },
];

fn digest_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(digest) = line.trim().strip_prefix("Digest:") else {
        return false;
    };
    acc.digest = Some(digest.trim().to_string());
    true
}

fn status_line(line: &str, acc: &mut Accumulator) -> bool {
    let line = line.trim();
    let Some(caps) = STATUS_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.up_to_date = line.contains("Image is up to date");
    acc.image = Some(caps[1].to_string());
    true
}

fn layer_line(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = LAYER_LINE.as_ref().and_then(|re| re.captures(line.trim())) else {
        return false;
    };
    let Some(phase) = LayerPhase::from_status(&caps[2]) else {
        return false;
    };
    acc.layers.push((short_id(&caps[1]), phase));
    true
}

/// The last line of a pull is the fully-qualified reference (`docker.io/library/nginx:latest`).
fn reference_line(line: &str, acc: &mut Accumulator) -> bool {
    let line = line.trim();
    if line.contains(' ') || !line.contains('/') || line.contains("://") {
        return false;
    }
    if acc.image.is_none() {
        acc.image = Some(line.to_string());
    }
    true
}

/// Parse `docker pull` output; `requested` is the image the caller asked for.
pub fn parse_pull(raw: &RawInvocation, requested: &str) -> DockerPull {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);

    let layers: Vec<Layer> = reduce_phases(acc.layers)
        .into_iter()
        .map(|(id, phase)| Layer { id, phase })
        .collect();
    let cached_layers = layers
        .iter()
        .filter(|l| l.phase == LayerPhase::AlreadyExists)
        .count();

    let image = acc
        .image
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| requested.trim().to_string());

    DockerPull {
        outcome: Outcome::from_invocation(raw, &DOCKER_ERRORS),
        image,
        digest: acc.digest.as_deref().map(short_id),
        digest_full: acc.digest.as_deref().map(full_digest),
        up_to_date: acc.up_to_date,
        layer_count: layers.len(),
        cached_layers,
        layers,
    }
}

impl Present for DockerPull {
    type Compact = DockerPullCompact;

    fn format_full(&self) -> String {
        let mut out = format!("docker pull {}: {}\n", self.image, self.outcome.headline());
        if let Some(digest) = &self.digest_full {
            out.push_str(&format!("digest: sha256:{digest}\n"));
        }
        if self.up_to_date {
            out.push_str("image is up to date\n");
        }
        out.push_str(&format!(
            "{} layer(s), {} cached\n",
            self.layer_count, self.cached_layers
        ));
        for layer in &self.layers {
            out.push_str(&format!("  {} {:?}\n", layer.id, layer.phase));
        }
        out
    }

    fn project_compact(&self) -> DockerPullCompact {
        DockerPullCompact {
            outcome: self.outcome.clone(),
            image: self.image.clone(),
            digest: self.digest.clone(),
            up_to_date: self.up_to_date,
            layer_count: self.layer_count,
            cached_layers: self.cached_layers,
        }
    }

    fn format_compact(compact: &DockerPullCompact) -> String {
        let state = if compact.up_to_date { "up to date" } else { "pulled" };
        let digest = compact.digest.as_deref().unwrap_or("-");
        if compact.outcome.is_success() {
            format!(
                "pull {}: {state}, digest {digest}, {} layer(s), {} cached\n",
                compact.image, compact.layer_count, compact.cached_layers
            )
        } else {
            format!("pull {}: {}\n", compact.image, compact.outcome.headline())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULL_LOG: &str = "\
Using default tag: latest
latest: Pulling from library/nginx
a2abf6c4d29d: Pulling fs layer
a9edb18cadd1: Already exists
589b7251471a: Pulling fs layer
a2abf6c4d29d: Downloading  1.2MB/31.4MB
589b7251471a: Waiting
a2abf6c4d29d: Verifying Checksum
a2abf6c4d29d: Download complete
589b7251471a: Download complete
a2abf6c4d29d: Extracting  31.4MB/31.4MB
a2abf6c4d29d: Pull complete
589b7251471a: Pull complete
Digest: sha256:0d17b565c37bcbd895e9d92315a05c1c3c9a29f762b011a10c54a66cd53c9b31
Status: Downloaded newer image for nginx:latest
docker.io/library/nginx:latest
";

    #[test]
    fn test_layers_reduced_to_final_phase() {
        let result = parse_pull(&RawInvocation::new(PULL_LOG, "", 0), "nginx");
        assert!(result.outcome.is_success());
        assert_eq!(result.layer_count, 3);
        assert_eq!(result.cached_layers, 1);
        assert!(result.layers.iter().all(|l| l.phase.is_done()));
        assert_eq!(result.layers[0].id, "a2abf6c4d29d");
    }

    #[test]
    fn test_digest_short_and_full() {
        let result = parse_pull(&RawInvocation::new(PULL_LOG, "", 0), "nginx");
        assert_eq!(result.digest.as_deref(), Some("0d17b565c37b"));
        assert_eq!(
            result.digest_full.as_deref(),
            Some("0d17b565c37bcbd895e9d92315a05c1c3c9a29f762b011a10c54a66cd53c9b31")
        );
        assert_eq!(result.image, "nginx:latest");
        assert!(!result.up_to_date);
    }

    #[test]
    fn test_up_to_date() {
        let log = "\
Using default tag: latest
latest: Pulling from library/alpine
Digest: sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b
Status: Image is up to date for alpine:latest
docker.io/library/alpine:latest
";
        let result = parse_pull(&RawInvocation::new(log, "", 0), "alpine");
        assert!(result.up_to_date);
        assert_eq!(result.layer_count, 0);
        let text = DockerPull::format_compact(&result.project_compact());
        assert!(text.contains("up to date"));
    }

    #[test]
    fn test_missing_image_classified() {
        let stderr = "Error response from daemon: pull access denied for nope, repository does not exist or may require 'docker login'";
        let result = parse_pull(&RawInvocation::new("Using default tag: latest\n", stderr, 1), "nope");
        assert_eq!(result.outcome.kind(), Some(DockerErrorKind::ImageNotFound));
        assert_eq!(result.image, "nope");
        assert!(result.digest.is_none());
    }
}

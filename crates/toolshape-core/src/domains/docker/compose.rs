//! `docker compose up` / `docker compose down` lifecycle logs.
//!
//! Compose reports every transition of every container, network, and volume.
//! Entities are reduced to a single row carrying their most advanced phase.
//! Both the v2 progress format (`✔ Container app-api-1  Started`) and the
//! legacy v1 format (`Creating app_api_1 ... done`) are understood.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{DockerErrorKind, DOCKER_ERRORS};
use crate::extract::{scan_lines, LineRule};
use crate::outcome::Outcome;
use crate::phase::reduce_phases;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;

/// Which compose command produced the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeAction {
    Up,
    Down,
}

/// Kind of compose-managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Container,
    Network,
    Volume,
    Image,
}

/// Lifecycle phase; later variants dominate earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposePhase {
    Waiting,
    Pulling,
    Pulled,
    Building,
    Built,
    Creating,
    Created,
    Recreate,
    Recreated,
    Starting,
    Started,
    Running,
    Healthy,
    Stopping,
    Stopped,
    Removing,
    Removed,
    Error,
}

impl ComposePhase {
    fn from_word(word: &str) -> Option<Self> {
        let phase = match word.to_ascii_lowercase().as_str() {
            "waiting" => Self::Waiting,
            "pulling" => Self::Pulling,
            "pulled" => Self::Pulled,
            "building" => Self::Building,
            "built" => Self::Built,
            "creating" => Self::Creating,
            "created" => Self::Created,
            "recreate" | "recreating" => Self::Recreate,
            "recreated" => Self::Recreated,
            "starting" => Self::Starting,
            "started" => Self::Started,
            "running" => Self::Running,
            "healthy" => Self::Healthy,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "removing" => Self::Removing,
            "removed" => Self::Removed,
            "error" => Self::Error,
            _ => return None,
        };
        Some(phase)
    }

    /// Completed form of a v1 progress verb (`Creating ... done` means created).
    fn completed(self) -> Self {
        match self {
            Self::Creating => Self::Created,
            Self::Recreate => Self::Recreated,
            Self::Starting => Self::Started,
            Self::Stopping => Self::Stopped,
            Self::Removing => Self::Removed,
            Self::Pulling => Self::Pulled,
            Self::Building => Self::Built,
            other => other,
        }
    }

    /// Whether a container in this phase is up.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Started | Self::Running | Self::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Pulling => "pulling",
            Self::Pulled => "pulled",
            Self::Building => "building",
            Self::Built => "built",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Recreate => "recreate",
            Self::Recreated => "recreated",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Running => "running",
            Self::Healthy => "healthy",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Removing => "removing",
            Self::Removed => "removed",
            Self::Error => "error",
        }
    }
}

/// One compose-managed object at its most advanced phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeEntity {
    pub kind: EntityKind,
    pub name: String,
    /// Service name for containers, derived from `<project>-<service>-<n>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub phase: ComposePhase,
}

/// Result of `docker compose up` or `down`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResult {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub action: ComposeAction,
    pub entities: Vec<ComposeEntity>,
    /// Containers up after the command.
    pub running: usize,
    /// Containers stopped or removed by the command.
    pub stopped: usize,
    pub failed: usize,
    /// Number of entities reported; the `[+] Running N/M` footer is used only
    /// when no itemized lines were found.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeCompact {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub action: ComposeAction,
    pub services: Vec<ServicePhase>,
    /// Number of containers before capping `services`.
    pub containers: usize,
    pub running: usize,
    pub stopped: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePhase {
    pub service: String,
    pub phase: ComposePhase,
}

/// Caller-side context for compose parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeContext {
    pub action: Option<ComposeAction>,
    /// Project name, used to strip the `<project>-` prefix from container names.
    pub project: Option<String>,
}

static V2_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:[^\w\s\[]\s+)?(Container|Network|Volume|Image)\s+"?([^"\s]+)"?\s+([A-Za-z]+)\b"#).ok()
});

static V1_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(Creating|Recreating|Starting|Stopping|Removing|Pulling|Building)\s+(\S+)\s*\.\.\.\s*(done|error)").ok()
});

static V1_NETWORK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*(Creating|Removing) network "?([^"\s]+)"?"#).ok()
});

static FOOTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\[\+\]\s+\w+\s+(\d+)/(\d+)").ok());

static REPLICA_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+?)[-_](\d+)$").ok());

#[derive(Default)]
struct Accumulator {
    events: Vec<((EntityKind, String), ComposePhase)>,
    footer_total: Option<usize>,
}

const LINE_RULES: &[LineRule<Accumulator>] = &[
    LineRule {
        name: "v2-entity",
        apply: v2_entity,
    },
    LineRule {
        name: "v1-network",
        apply: v1_network,
    },
    LineRule {
        name: "v1-container",
        apply: v1_container,
    },
    LineRule {
        name: "footer",
        apply: footer,
    },
];

fn v2_entity(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = V2_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let Some(phase) = ComposePhase::from_word(&caps[3]) else {
        return false;
    };
    let kind = match &caps[1] {
        "Container" => EntityKind::Container,
        "Network" => EntityKind::Network,
        "Volume" => EntityKind::Volume,
        _ => EntityKind::Image,
    };
    acc.events.push(((kind, caps[2].to_string()), phase));
    true
}

fn v1_network(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = V1_NETWORK.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let phase = if &caps[1] == "Creating" {
        ComposePhase::Created
    } else {
        ComposePhase::Removed
    };
    acc.events
        .push(((EntityKind::Network, caps[2].to_string()), phase));
    true
}

fn v1_container(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = V1_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    let Some(verb) = ComposePhase::from_word(&caps[1]) else {
        return false;
    };
    let phase = if &caps[3] == "done" {
        verb.completed()
    } else {
        ComposePhase::Error
    };
    acc.events
        .push(((EntityKind::Container, caps[2].to_string()), phase));
    true
}

fn footer(line: &str, acc: &mut Accumulator) -> bool {
    let Some(caps) = FOOTER.as_ref().and_then(|re| re.captures(line)) else {
        return false;
    };
    acc.footer_total = caps[2].parse().ok();
    true
}

/// Derive the service name from a compose container name.
fn service_name(container: &str, project: Option<&str>) -> String {
    let base = REPLICA_SUFFIX
        .as_ref()
        .and_then(|re| re.captures(container))
        .and_then(|caps| caps.get(1))
        .map_or(container, |m| m.as_str());
    if let Some(project) = project {
        for sep in ['-', '_'] {
            if let Some(rest) = base.strip_prefix(&format!("{project}{sep}")) {
                return rest.to_string();
            }
        }
    }
    base.to_string()
}

/// Parse a compose lifecycle log. Compose writes progress to stderr, so both streams are scanned.
pub fn parse_compose(raw: &RawInvocation, ctx: &ComposeContext) -> ComposeResult {
    let mut acc = Accumulator::default();
    scan_lines(&raw.stderr, LINE_RULES, &mut acc);
    scan_lines(&raw.stdout, LINE_RULES, &mut acc);

    let entities: Vec<ComposeEntity> = reduce_phases(acc.events)
        .into_iter()
        .map(|((kind, name), phase)| ComposeEntity {
            service: (kind == EntityKind::Container)
                .then(|| service_name(&name, ctx.project.as_deref())),
            kind,
            name,
            phase,
        })
        .collect();

    let action = ctx.action.unwrap_or_else(|| infer_action(&entities));
    let containers = || entities.iter().filter(|e| e.kind == EntityKind::Container);
    let running = containers().filter(|e| e.phase.is_up()).count();
    let stopped = containers()
        .filter(|e| matches!(e.phase, ComposePhase::Stopped | ComposePhase::Removed))
        .count();
    let failed = entities
        .iter()
        .filter(|e| e.phase == ComposePhase::Error)
        .count();
    let total = if entities.is_empty() {
        acc.footer_total.unwrap_or(0)
    } else {
        entities.len()
    };

    let outcome = if failed > 0 && raw.succeeded() {
        Outcome::classified(raw, &DOCKER_ERRORS)
    } else {
        Outcome::from_invocation(raw, &DOCKER_ERRORS)
    };

    ComposeResult {
        outcome,
        action,
        entities,
        running,
        stopped,
        failed,
        total,
    }
}

fn infer_action(entities: &[ComposeEntity]) -> ComposeAction {
    let teardown = entities
        .iter()
        .any(|e| {
            matches!(
                e.phase,
                ComposePhase::Stopping | ComposePhase::Stopped | ComposePhase::Removing | ComposePhase::Removed
            )
        });
    if teardown {
        ComposeAction::Down
    } else {
        ComposeAction::Up
    }
}

impl Present for ComposeResult {
    type Compact = ComposeCompact;

    fn format_full(&self) -> String {
        let action = match self.action {
            ComposeAction::Up => "up",
            ComposeAction::Down => "down",
        };
        let mut out = format!(
            "docker compose {action}: {}, {} running, {} stopped, {} failed\n",
            self.outcome.headline(),
            self.running,
            self.stopped,
            self.failed
        );
        for e in &self.entities {
            let kind = match e.kind {
                EntityKind::Container => "container",
                EntityKind::Network => "network",
                EntityKind::Volume => "volume",
                EntityKind::Image => "image",
            };
            out.push_str(&format!("{kind} {} {}\n", e.name, e.phase.as_str()));
        }
        out
    }

    fn project_compact(&self) -> ComposeCompact {
        let services: Vec<&ComposeEntity> = self
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Container)
            .collect();
        ComposeCompact {
            outcome: self.outcome.clone(),
            action: self.action,
            services: cap_map(&services, COMPACT_LIST_LIMIT, |e| ServicePhase {
                service: e.service.clone().unwrap_or_else(|| e.name.clone()),
                phase: e.phase,
            }),
            containers: services.len(),
            running: self.running,
            stopped: self.stopped,
            failed: self.failed,
            total: self.total,
        }
    }

    fn format_compact(compact: &ComposeCompact) -> String {
        let mut out = format!(
            "compose: {}, {} running, {} stopped, {} failed\n",
            compact.outcome.headline(),
            compact.running,
            compact.stopped,
            compact.failed
        );
        let shown: Vec<String> = compact
            .services
            .iter()
            .map(|s| format!("{}={}", s.service, s.phase.as_str()))
            .collect();
        if !shown.is_empty() {
            out.push_str(&shown.join(" "));
            out.push('\n');
        }
        if let Some(more) = more_line(compact.containers, compact.services.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP_LOG: &str = "\
[+] Running 4/4
 ✔ Network app_default  Created                                   0.1s
 ⠿ Container api  Creating                                        0.2s
 ⠿ Container db  Creating                                         0.2s
 ⠿ Container api  Created                                         0.3s
 ⠿ Container db  Created                                          0.3s
 ⠿ Container db  Starting                                         0.4s
 ⠿ Container api  Starting                                        0.4s
 ✔ Container db  Started                                          0.5s
 ✔ Container db  Waiting                                          0.6s
 ✔ Container db  Healthy                                          1.6s
 ✔ Container api  Started                                         1.7s
";

    fn up(log: &str) -> ComposeResult {
        parse_compose(&RawInvocation::new("", log, 0), &ComposeContext::default())
    }

    #[test]
    fn test_each_service_appears_once_with_latest_phase() {
        let result = up(UP_LOG);
        let api: Vec<_> = result.entities.iter().filter(|e| e.name == "api").collect();
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].phase, ComposePhase::Started);

        let db = result.entities.iter().find(|e| e.name == "db").unwrap();
        assert_eq!(db.phase, ComposePhase::Healthy);

        assert_eq!(result.entities.len(), 3);
        assert_eq!(result.running, 2);
        assert_eq!(result.total, 3);
        assert_eq!(result.action, ComposeAction::Up);
    }

    #[test]
    fn test_entities_keep_first_appearance_order() {
        let names: Vec<_> = up(UP_LOG).entities.into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["app_default", "api", "db"]);
    }

    #[test]
    fn test_down_removed_dominates_removing() {
        let log = "\
 Container app-api-1  Stopping
 Container app-api-1  Stopped
 Container app-api-1  Removing
 Container app-api-1  Removed
 Network app_default  Removing
 Network app_default  Removed
";
        let ctx = ComposeContext {
            action: None,
            project: Some("app".to_string()),
        };
        let result = parse_compose(&RawInvocation::new("", log, 0), &ctx);
        assert_eq!(result.action, ComposeAction::Down);
        assert_eq!(result.entities[0].phase, ComposePhase::Removed);
        assert_eq!(result.entities[0].service.as_deref(), Some("api"));
        assert_eq!(result.stopped, 1);
        assert_eq!(result.running, 0);
    }

    #[test]
    fn test_legacy_v1_format() {
        let log = "\
Creating network \"app_default\" with the default driver
Creating app_db_1 ... done
Creating app_api_1 ... error
";
        let result = up(log);
        assert_eq!(result.entities.len(), 3);
        assert_eq!(result.entities[1].phase, ComposePhase::Created);
        assert_eq!(result.entities[2].phase, ComposePhase::Error);
        assert_eq!(result.failed, 1);
        assert!(!result.outcome.is_success());
    }

    #[test]
    fn test_footer_only_when_no_items() {
        let result = up("[+] Running 5/5\n");
        assert!(result.entities.is_empty());
        assert_eq!(result.total, 5);

        let result = up(UP_LOG);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_port_conflict_classified() {
        let log = " Container api  Starting\nError response from daemon: driver failed programming external connectivity: Bind for 0.0.0.0:8080 failed: port is already allocated\n";
        let result = parse_compose(&RawInvocation::new("", log, 1), &ComposeContext::default());
        assert_eq!(result.outcome.kind(), Some(DockerErrorKind::PortInUse));
        assert_eq!(result.entities.len(), 1);
    }

    #[test]
    fn test_service_name_derivation() {
        assert_eq!(service_name("app-api-1", Some("app")), "api");
        assert_eq!(service_name("app_web_worker_2", Some("app")), "web_worker");
        assert_eq!(service_name("app-api-1", None), "app-api");
        assert_eq!(service_name("api", None), "api");
    }

    #[test]
    fn test_compact_lists_services() {
        let compact = up(UP_LOG).project_compact();
        let services: Vec<_> = compact.services.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(services, vec!["api", "db"]);
        let text = ComposeResult::format_compact(&compact);
        assert!(text.contains("api=started"));
        assert_eq!(text, ComposeResult::format_compact(&compact));
    }
}

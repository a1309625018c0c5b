//! `docker ps` parsing.
//!
//! Accepts the per-line JSON emitted by `--format '{{json .}}'`, the JSON
//! array printed by podman-compatible CLIs, and the default aligned table.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DockerErrorKind, DOCKER_ERRORS};
use crate::extract::{first_success, json_array, json_lines, ColumnLayout, Strategy};
use crate::ident::short_id;
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;
use crate::units::parse_size;

/// Coarse container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    fn from_state(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Derive a state from a human status such as `Up 2 hours (Paused)`.
    fn from_status(status: &str) -> Self {
        let status = status.trim();
        if status.contains("(Paused)") {
            Self::Paused
        } else if status.starts_with("Up") {
            Self::Running
        } else if status.starts_with("Exited") {
            Self::Exited
        } else if status.starts_with("Created") {
            Self::Created
        } else if status.starts_with("Restarting") {
            Self::Restarting
        } else if status.starts_with("Removal") {
            Self::Removing
        } else if status.starts_with("Dead") {
            Self::Dead
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

/// One published or exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

impl std::fmt::Display for PortBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.host_ip.as_deref(), self.host_port) {
            (Some(ip), Some(host)) => write!(f, "{ip}:{host}->")?,
            (None, Some(host)) => write!(f, "{host}->")?,
            _ => {}
        }
        write!(f, "{}/{}", self.container_port, self.protocol)
    }
}

/// A container row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub status: String,
    pub ports: Vec<PortBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Result of `docker ps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerPs {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub containers: Vec<Container>,
    pub total: usize,
    pub running: usize,
}

/// Compact `docker ps`: primary keys and state only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerPsCompact {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub containers: Vec<ContainerSummary>,
    pub total: usize,
    pub running: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NamesField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct StructuredPort {
    #[serde(default, alias = "hostIp", alias = "host_ip", alias = "IP")]
    host_ip: Option<String>,
    #[serde(default, alias = "hostPort", alias = "host_port", alias = "PublicPort")]
    host_port: Option<u16>,
    #[serde(alias = "containerPort", alias = "container_port", alias = "PrivatePort")]
    container_port: u16,
    #[serde(default, alias = "Type")]
    protocol: Option<String>,
    #[serde(default)]
    range: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortsField {
    Text(String),
    Structured(Vec<StructuredPort>),
}

/// A `docker ps` JSON record across docker and podman field spellings.
#[derive(Debug, Deserialize)]
struct PsRecord {
    #[serde(rename = "ID", alias = "Id", alias = "id")]
    id: Option<String>,
    #[serde(rename = "Names", alias = "names")]
    names: Option<NamesField>,
    #[serde(rename = "Image", alias = "image")]
    image: Option<String>,
    #[serde(rename = "State", alias = "state")]
    state: Option<String>,
    #[serde(rename = "Status", alias = "status")]
    status: Option<String>,
    #[serde(rename = "Ports", alias = "ports")]
    ports: Option<PortsField>,
    #[serde(rename = "CreatedAt", alias = "Created", alias = "created")]
    created: Option<serde_json::Value>,
    /// Docker prints `"2B (virtual 187MB)"`, podman an object of byte counts.
    #[serde(rename = "Size", alias = "size")]
    size: Option<serde_json::Value>,
}

impl PsRecord {
    fn into_container(self) -> Container {
        let status = self.status.unwrap_or_default();
        let state = match self.state.as_deref() {
            Some(s) if !s.trim().is_empty() => ContainerState::from_state(s),
            _ => ContainerState::from_status(&status),
        };
        let name = match self.names {
            Some(NamesField::One(n)) => first_name(&n),
            Some(NamesField::Many(list)) => list.first().map(|n| first_name(n)).unwrap_or_default(),
            None => String::new(),
        };
        let ports = match self.ports {
            Some(PortsField::Text(text)) => parse_ports(&text),
            Some(PortsField::Structured(list)) => list.into_iter().flat_map(structured_ports).collect(),
            None => Vec::new(),
        };
        let created = match self.created {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Container {
            id: short_id(&self.id.unwrap_or_default()),
            name: or_unknown(name),
            image: or_unknown(self.image.unwrap_or_default()),
            state,
            status,
            ports,
            created,
            size_bytes: self.size.as_ref().and_then(size_bytes),
        }
    }
}

fn size_bytes(size: &serde_json::Value) -> Option<u64> {
    match size {
        serde_json::Value::String(text) => parse_size(text),
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::Object(fields) => ["rwSize", "RwSize", "rootFsSize", "RootFsSize"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(serde_json::Value::as_u64)),
        _ => None,
    }
}

fn first_name(names: &str) -> String {
    names
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('/')
        .to_string()
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        "unknown".to_string()
    } else {
        value
    }
}

fn structured_ports(port: StructuredPort) -> Vec<PortBinding> {
    let protocol = port.protocol.unwrap_or_else(|| "tcp".to_string());
    let host_ip = port.host_ip.filter(|ip| !ip.is_empty());
    let count = port.range.unwrap_or(1).max(1);
    (0..count)
        .filter_map(|offset| {
            Some(PortBinding {
                host_ip: host_ip.clone(),
                host_port: match port.host_port {
                    Some(p) if p != 0 => Some(p.checked_add(offset)?),
                    _ => None,
                },
                container_port: port.container_port.checked_add(offset)?,
                protocol: protocol.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Parse docker's port summary, e.g.
/// `0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp, 0.0.0.0:7000-7001->7000-7001/udp`.
///
/// Entries keep their textual order; ranges expand to one binding per port.
/// Unparseable entries are skipped.
pub fn parse_ports(text: &str) -> Vec<PortBinding> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .flat_map(parse_port_entry)
        .collect()
}

fn parse_port_entry(entry: &str) -> Vec<PortBinding> {
    let (mapping, protocol) = entry.rsplit_once('/').unwrap_or((entry, "tcp"));
    let (host, container) = match mapping.split_once("->") {
        Some((host, container)) => (Some(host), container),
        None => (None, mapping),
    };

    let Some((container_start, container_end)) = port_range(container) else {
        debug!(entry, "skipping unparseable port entry");
        return Vec::new();
    };

    let (host_ip, host_range) = match host {
        Some(host) => {
            let (ip, port) = host.rsplit_once(':').unwrap_or(("", host));
            let ip = ip.trim_start_matches('[').trim_end_matches(']');
            let ip = (!ip.is_empty()).then(|| ip.to_string());
            (ip, port_range(port))
        }
        None => (None, None),
    };

    (container_start..=container_end)
        .enumerate()
        .map(|(offset, container_port)| PortBinding {
            host_ip: host_ip.clone(),
            host_port: host_range.and_then(|(start, end)| {
                let port = start.checked_add(offset as u16)?;
                (port <= end).then_some(port)
            }),
            container_port,
            protocol: protocol.to_string(),
        })
        .collect()
}

fn port_range(text: &str) -> Option<(u16, u16)> {
    let text = text.trim();
    match text.split_once('-') {
        Some((a, b)) => {
            let (a, b) = (a.parse().ok()?, b.parse().ok()?);
            (a <= b).then_some((a, b))
        }
        None => {
            let p = text.parse().ok()?;
            Some((p, p))
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

const STRATEGIES: &[Strategy<Vec<Container>>] = &[
    Strategy {
        name: "json-lines",
        extract: from_json_lines,
    },
    Strategy {
        name: "json-array",
        extract: from_json_array,
    },
    Strategy {
        name: "table",
        extract: from_table,
    },
];

fn from_json_lines(raw: &RawInvocation) -> Option<Vec<Container>> {
    let records: Vec<PsRecord> = json_lines(&raw.stdout);
    (!records.is_empty()).then(|| records.into_iter().map(PsRecord::into_container).collect())
}

fn from_json_array(raw: &RawInvocation) -> Option<Vec<Container>> {
    let records: Vec<PsRecord> = json_array(&raw.stdout)?;
    Some(records.into_iter().map(PsRecord::into_container).collect())
}

fn from_table(raw: &RawInvocation) -> Option<Vec<Container>> {
    let mut lines = raw.stdout.lines().skip_while(|l| !l.contains("CONTAINER ID"));
    let layout = ColumnLayout::from_header(lines.next()?)?;
    let containers = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let status = layout.cell(line, "STATUS").to_string();
            Container {
                id: short_id(layout.cell(line, "CONTAINER ID")),
                name: or_unknown(first_name(layout.cell(line, "NAMES"))),
                image: or_unknown(layout.cell(line, "IMAGE").to_string()),
                state: ContainerState::from_status(&status),
                ports: parse_ports(layout.cell(line, "PORTS")),
                created: Some(layout.cell(line, "CREATED").to_string()).filter(|c| !c.is_empty()),
                size_bytes: parse_size(layout.cell(line, "SIZE")),
                status,
            }
        })
        .collect();
    Some(containers)
}

/// Parse `docker ps` output.
pub fn parse_ps(raw: &RawInvocation) -> DockerPs {
    let containers = first_success(raw, STRATEGIES).unwrap_or_default();
    let running = containers
        .iter()
        .filter(|c| c.state == ContainerState::Running)
        .count();
    DockerPs {
        outcome: Outcome::from_invocation(raw, &DOCKER_ERRORS),
        total: containers.len(),
        running,
        containers,
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

impl Present for DockerPs {
    type Compact = DockerPsCompact;

    fn format_full(&self) -> String {
        let mut out = format!(
            "docker ps: {}, {} container(s), {} running\n",
            self.outcome.headline(),
            self.total,
            self.running
        );
        for c in &self.containers {
            out.push_str(&format!(
                "{} {} ({}) {} [{}]\n",
                c.id,
                c.name,
                c.image,
                c.state.as_str(),
                c.status
            ));
            if !c.ports.is_empty() {
                let ports: Vec<String> = c.ports.iter().map(ToString::to_string).collect();
                out.push_str(&format!("  ports: {}\n", ports.join(", ")));
            }
        }
        out
    }

    fn project_compact(&self) -> DockerPsCompact {
        DockerPsCompact {
            outcome: self.outcome.clone(),
            containers: cap_map(&self.containers, COMPACT_LIST_LIMIT, |c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state,
            }),
            total: self.total,
            running: self.running,
        }
    }

    fn format_compact(compact: &DockerPsCompact) -> String {
        let mut out = format!(
            "docker ps: {}, {}/{} running\n",
            compact.outcome.headline(),
            compact.running,
            compact.total
        );
        for c in &compact.containers {
            out.push_str(&format!("{} {} {}\n", c.id, c.name, c.state.as_str()));
        }
        if let Some(more) = more_line(compact.total, compact.containers.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB: &str = r#"{"Command":"\"/docker-entrypoint.…\"","CreatedAt":"2024-05-01 10:00:00 +0000 UTC","ID":"4bcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789","Image":"nginx:latest","Names":"web","Ports":"0.0.0.0:8080->80/tcp, 0.0.0.0:443->443/tcp","RunningFor":"2 hours ago","Size":"1.09kB (virtual 187MB)","State":"running","Status":"Up 2 hours"}"#;

    #[test]
    fn test_ports_keep_order_and_fields() {
        let raw = RawInvocation::new(WEB, "", 0);
        let ps = parse_ps(&raw);
        assert!(ps.outcome.is_success());
        assert_eq!(ps.total, 1);
        let ports = &ps.containers[0].ports;
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].host_ip.as_deref(), Some("0.0.0.0"));
        assert_eq!(ports[0].host_port, Some(8080));
        assert_eq!(ports[0].container_port, 80);
        assert_eq!(ports[0].protocol, "tcp");
        assert_eq!(ports[1].host_port, Some(443));
        assert_eq!(ports[1].container_port, 443);
    }

    #[test]
    fn test_record_normalization() {
        let ps = parse_ps(&RawInvocation::new(WEB, "", 0));
        let c = &ps.containers[0];
        assert_eq!(c.id, "4bcdef012345");
        assert_eq!(c.state, ContainerState::Running);
        assert_eq!(c.size_bytes, Some(1090));
        assert_eq!(ps.running, 1);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let ps = parse_ps(&RawInvocation::new(r#"{"Status":"Exited (0) 3 days ago"}"#, "", 0));
        let c = &ps.containers[0];
        assert_eq!(c.name, "unknown");
        assert_eq!(c.image, "unknown");
        assert_eq!(c.state, ContainerState::Exited);
        assert!(c.ports.is_empty());
    }

    #[test]
    fn test_podman_array_shape() {
        let stdout = r#"[{"Id":"abcdef0123456789","Names":["api"],"Image":"app:1","State":"running","Ports":[{"host_ip":"","container_port":8000,"host_port":9000,"range":2,"protocol":"tcp"}]}]"#;
        let ps = parse_ps(&RawInvocation::new(stdout, "", 0));
        let c = &ps.containers[0];
        assert_eq!(c.name, "api");
        assert_eq!(c.ports.len(), 2);
        assert_eq!(c.ports[1].host_port, Some(9001));
        assert_eq!(c.ports[1].container_port, 8001);
        assert!(c.ports[0].host_ip.is_none());
    }

    #[test]
    fn test_odd_array_item_keeps_the_rest() {
        let stdout = r#"[
            {"Id":"abcdef0123456789","Names":["api"],"Image":"app:1","State":"running","Size":{"rwSize":4096,"rootFsSize":7340032}},
            {"Id":42,"Names":["broken"]},
            {"Id":"0123456789abcdef","Names":["db"],"Image":"postgres:16","State":"exited","Ports":null,"Size":null}
        ]"#;
        let ps = parse_ps(&RawInvocation::new(stdout, "", 0));
        assert!(ps.outcome.is_success());
        assert_eq!(ps.total, 2);
        assert_eq!(ps.containers[0].size_bytes, Some(4096));
        assert_eq!(ps.containers[1].name, "db");
        assert!(ps.containers[1].size_bytes.is_none());
    }

    #[test]
    fn test_table_fallback() {
        let stdout = "CONTAINER ID   IMAGE          STATUS                    PORTS                  NAMES\n\
                      abc123def456   nginx:latest   Up 2 hours                0.0.0.0:8080->80/tcp   web\n\
                      fed987654321   redis:7        Up 5 minutes (Paused)                            cache\n";
        let ps = parse_ps(&RawInvocation::new(stdout, "", 0));
        assert_eq!(ps.total, 2);
        assert_eq!(ps.containers[0].ports[0].host_port, Some(8080));
        assert_eq!(ps.containers[1].name, "cache");
        assert_eq!(ps.containers[1].state, ContainerState::Paused);
        assert_eq!(ps.running, 1);
    }

    #[test]
    fn test_parse_ports_variants() {
        let ports = parse_ports(":::8080->80/tcp, 443/tcp, 0.0.0.0:7000-7001->7000-7001/udp, [::1]:53->53/udp, garbage");
        assert_eq!(ports.len(), 5);
        assert_eq!(ports[0].host_ip.as_deref(), Some("::"));
        assert_eq!(ports[1].host_port, None);
        assert_eq!(ports[1].container_port, 443);
        assert_eq!(ports[3].host_port, Some(7001));
        assert_eq!(ports[3].protocol, "udp");
        assert_eq!(ports[4].host_ip.as_deref(), Some("::1"));
    }

    #[test]
    fn test_daemon_down_is_classified() {
        let raw = RawInvocation::new(
            "",
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
            1,
        );
        let ps = parse_ps(&raw);
        assert_eq!(ps.outcome.kind(), Some(DockerErrorKind::DaemonUnreachable));
        assert_eq!(ps.total, 0);
    }

    #[test]
    fn test_compact_caps_and_drops_ports() {
        let stdout: String = (0..15)
            .map(|i| format!(r#"{{"ID":"{i:012x}","Names":"c{i}","Image":"img","State":"running","Ports":"80/tcp"}}"#))
            .collect::<Vec<_>>()
            .join("\n");
        let ps = parse_ps(&RawInvocation::new(stdout, "", 0));
        let compact = ps.project_compact();
        assert_eq!(compact.containers.len(), COMPACT_LIST_LIMIT);
        assert_eq!(compact.total, 15);
        let json = serde_json::to_value(&compact).unwrap();
        assert!(json["containers"][0].get("ports").is_none());
        assert!(DockerPs::format_compact(&compact).contains("and 5 more"));
    }
}

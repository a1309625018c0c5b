//! `kubectl get`.
//!
//! Both list documents (`kind: List`, `PodList`, ...) and single objects are
//! accepted. The default wide-table output is understood as a fallback.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::extract::{json_items, json_object, ColumnLayout};
use crate::guard::{assert_no_flag_injection, GuardResult};
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;

crate::error_kinds! {
    pub enum KubectlErrorKind {
        NotFound => "not-found",
        Forbidden => "forbidden",
        ConnectionRefused => "connection-refused",
        ResourceTypeUnknown => "resource-type-unknown",
        Unknown => "unknown",
    }
}

pub static KUBECTL_ERRORS: LazyLock<Classifier<KubectlErrorKind>> = LazyLock::new(|| {
    Classifier::new()
        .pattern(
            r"connection refused|unable to connect to the server|was refused|no such host|i/o timeout",
            KubectlErrorKind::ConnectionRefused,
        )
        .pattern(
            r"doesn't have a resource type|no matches for kind|the server could not find the requested resource",
            KubectlErrorKind::ResourceTypeUnknown,
        )
        .pattern(r"\(forbidden\)|is forbidden|unauthorized", KubectlErrorKind::Forbidden)
        .pattern(r"\(notfound\)|not found", KubectlErrorKind::NotFound)
});

/// Caller parameters for `kubectl get`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetArgs {
    pub resource: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub all_namespaces: bool,
    #[serde(default)]
    pub selector: Option<String>,
}

/// `kubectl get <resource> [name] [-n ns | -A] [-l selector] -o json`
pub fn get_args(args: &GetArgs) -> GuardResult<Vec<String>> {
    assert_no_flag_injection(&args.resource, "resource")?;
    if let Some(name) = &args.name {
        assert_no_flag_injection(name, "name")?;
    }
    if let Some(ns) = &args.namespace {
        assert_no_flag_injection(ns, "namespace")?;
    }
    if let Some(selector) = &args.selector {
        assert_no_flag_injection(selector, "selector")?;
    }

    let mut argv = vec!["get".to_string(), args.resource.clone()];
    if let Some(name) = &args.name {
        argv.push(name.clone());
    }
    if args.all_namespaces {
        argv.push("--all-namespaces".to_string());
    } else if let Some(ns) = &args.namespace {
        argv.push("--namespace".to_string());
        argv.push(ns.clone());
    }
    if let Some(selector) = &args.selector {
        argv.push("--selector".to_string());
        argv.push(selector.clone());
    }
    argv.push("--output".to_string());
    argv.push("json".to_string());
    Ok(argv)
}

/// Request context used to fill fields the output omits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetContext {
    pub resource: Option<String>,
    pub namespace: Option<String>,
}

impl From<&GetArgs> for GetContext {
    fn from(args: &GetArgs) -> Self {
        Self {
            resource: Some(args.resource.clone()),
            namespace: args.namespace.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub status: String,
    /// Creation timestamp from JSON, or the `AGE` column from table output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

impl Resource {
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Result of `kubectl get`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubectlGet {
    #[serde(flatten)]
    pub outcome: Outcome<KubectlErrorKind>,
    pub resources: Vec<Resource>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubectlGetCompact {
    #[serde(flatten)]
    pub outcome: Outcome<KubectlErrorKind>,
    pub resources: Vec<ResourceSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSummary {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ObjectDoc {
    #[serde(default)]
    kind: Option<String>,
    /// Decoded one by one so a single odd item does not sink the list.
    #[serde(default)]
    items: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    metadata: Option<MetadataDoc>,
    #[serde(default)]
    status: Option<StatusDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDoc {
    name: Option<String>,
    namespace: Option<String>,
    creation_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusDoc {
    phase: Option<String>,
    replicas: Option<u32>,
    ready_replicas: Option<u32>,
    #[serde(default)]
    conditions: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ConditionDoc {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl StatusDoc {
    fn summary(&self) -> Option<String> {
        if let Some(phase) = self.phase.as_deref().filter(|p| !p.is_empty()) {
            return Some(phase.to_string());
        }
        if let Some(replicas) = self.replicas {
            return Some(format!("{}/{replicas} ready", self.ready_replicas.unwrap_or(0)));
        }
        let conditions: Vec<ConditionDoc> = json_items(self.conditions.clone().unwrap_or_default());
        let ready = conditions
            .into_iter()
            .find(|c| matches!(c.kind.as_deref(), Some("Ready" | "Available")))?;
        let kind = ready.kind?;
        let state = if ready.status.is_some_and(|s| s.eq_ignore_ascii_case("true")) {
            kind
        } else {
            format!("Not{kind}")
        };
        Some(state)
    }
}

/// Singular kind from a resource argument such as `pods` or `deploy`.
fn kind_from_resource(resource: &str) -> String {
    let base = resource.split(['/', '.']).next().unwrap_or(resource);
    let singular = match base {
        "po" | "pods" | "pod" => "Pod",
        "svc" | "services" | "service" => "Service",
        "deploy" | "deployments" | "deployment" => "Deployment",
        "no" | "nodes" | "node" => "Node",
        "ns" | "namespaces" | "namespace" => "Namespace",
        "cm" | "configmaps" | "configmap" => "ConfigMap",
        "rs" | "replicasets" | "replicaset" => "ReplicaSet",
        "sts" | "statefulsets" | "statefulset" => "StatefulSet",
        "ds" | "daemonsets" | "daemonset" => "DaemonSet",
        "ing" | "ingresses" | "ingress" => "Ingress",
        "secrets" | "secret" => "Secret",
        "jobs" | "job" => "Job",
        other => return other.trim_end_matches('s').to_string(),
    };
    singular.to_string()
}

fn resource_from_doc(doc: ObjectDoc, list_kind: Option<&str>, ctx: &GetContext) -> Resource {
    let kind = doc
        .kind
        .filter(|k| !k.is_empty())
        .or_else(|| list_kind.and_then(|k| k.strip_suffix("List")).filter(|k| !k.is_empty()).map(str::to_string))
        .or_else(|| ctx.resource.as_deref().map(kind_from_resource))
        .unwrap_or_else(|| "unknown".to_string());
    let metadata = doc.metadata.unwrap_or_default();
    Resource {
        kind,
        name: metadata.name.unwrap_or_else(|| "unknown".to_string()),
        namespace: metadata.namespace.or_else(|| ctx.namespace.clone()),
        status: doc
            .status
            .as_ref()
            .and_then(StatusDoc::summary)
            .unwrap_or_else(|| "unknown".to_string()),
        age: metadata.creation_timestamp,
    }
}

fn from_json(raw: &RawInvocation, ctx: &GetContext) -> Option<Vec<Resource>> {
    let doc: ObjectDoc = json_object(&raw.stdout)?;
    match doc.items {
        Some(items) => {
            let list_kind = doc.kind;
            Some(
                json_items::<ObjectDoc>(items)
                    .into_iter()
                    .map(|item| resource_from_doc(item, list_kind.as_deref(), ctx))
                    .collect(),
            )
        }
        None if doc.metadata.as_ref().is_some_and(|m| m.name.is_some()) => Some(vec![resource_from_doc(doc, None, ctx)]),
        None => None,
    }
}

fn from_table(raw: &RawInvocation, ctx: &GetContext) -> Option<Vec<Resource>> {
    let mut lines = raw
        .stdout
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("NAME"));
    let layout = ColumnLayout::from_header(lines.next()?)?;
    let kind = ctx
        .resource
        .as_deref()
        .map(kind_from_resource)
        .unwrap_or_else(|| "unknown".to_string());
    let resources = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut name = layout.cell(line, "NAME").to_string();
            let mut kind = kind.clone();
            // `kubectl get all` prefixes names with `kind/`.
            if let Some((prefix, rest)) = name.split_once('/') {
                kind = kind_from_resource(prefix);
                name = rest.to_string();
            }
            let status = ["STATUS", "READY"]
                .iter()
                .map(|col| layout.cell(line, col))
                .find(|cell| !cell.is_empty())
                .unwrap_or("unknown")
                .to_string();
            let namespace = Some(layout.cell(line, "NAMESPACE"))
                .filter(|ns| !ns.is_empty())
                .map(str::to_string)
                .or_else(|| ctx.namespace.clone());
            Resource {
                kind,
                name,
                namespace,
                status,
                age: Some(layout.cell(line, "AGE").to_string()).filter(|a| !a.is_empty()),
            }
        })
        .collect();
    Some(resources)
}

/// Parse `kubectl get` output.
pub fn parse_get(raw: &RawInvocation, ctx: &GetContext) -> KubectlGet {
    // JSON first, then the default table; both need the request context.
    let resources = from_json(raw, ctx)
        .or_else(|| from_table(raw, ctx))
        .unwrap_or_default();
    KubectlGet {
        outcome: Outcome::from_invocation(raw, &KUBECTL_ERRORS),
        total: resources.len(),
        resources,
    }
}

impl Present for KubectlGet {
    type Compact = KubectlGetCompact;

    fn format_full(&self) -> String {
        let mut out = format!("kubectl get: {}, {} resource(s)\n", self.outcome.headline(), self.total);
        for r in &self.resources {
            out.push_str(&format!(
                "{} {} {}{}\n",
                r.kind,
                r.qualified_name(),
                r.status,
                r.age.as_deref().map(|a| format!(" ({a})")).unwrap_or_default()
            ));
        }
        out
    }

    fn project_compact(&self) -> KubectlGetCompact {
        KubectlGetCompact {
            outcome: self.outcome.clone(),
            resources: cap_map(&self.resources, COMPACT_LIST_LIMIT, |r| ResourceSummary {
                name: r.qualified_name(),
                status: r.status.clone(),
            }),
            total: self.total,
        }
    }

    fn format_compact(compact: &KubectlGetCompact) -> String {
        let mut out = format!("kubectl get: {}, {} resource(s)\n", compact.outcome.headline(), compact.total);
        for r in &compact.resources {
            out.push_str(&format!("{} {}\n", r.name, r.status));
        }
        if let Some(more) = more_line(compact.total, compact.resources.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}

//! `docker images` parsing.

use serde::{Deserialize, Serialize};

use super::{DockerErrorKind, DOCKER_ERRORS};
use crate::extract::{first_success, json_array, json_lines, ColumnLayout, Strategy};
use crate::ident::short_id;
use crate::outcome::Outcome;
use crate::present::{cap_map, more_line, Present, COMPACT_LIST_LIMIT};
use crate::raw::RawInvocation;
use crate::units::{format_bytes, parse_size};

/// A local image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub repository: String,
    pub tag: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub size_bytes: u64,
}

impl Image {
    /// `repository:tag`, the key a user pulls or runs by.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Result of `docker images`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImages {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub images: Vec<Image>,
    pub total: usize,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImagesCompact {
    #[serde(flatten)]
    pub outcome: Outcome<DockerErrorKind>,
    pub images: Vec<ImageSummary>,
    pub total: usize,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub reference: String,
    pub id: String,
    pub size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ImageRecord {
    #[serde(rename = "Repository", alias = "repository")]
    repository: Option<String>,
    #[serde(rename = "Tag", alias = "tag")]
    tag: Option<String>,
    #[serde(rename = "ID", alias = "Id", alias = "id")]
    id: Option<String>,
    #[serde(rename = "CreatedSince", alias = "CreatedAt")]
    created: Option<String>,
    #[serde(rename = "Size", alias = "size")]
    size: Option<SizeField>,
}

/// Docker prints sizes as text, podman as a byte count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Bytes(u64),
    Text(String),
    Other(serde_json::Value),
}

impl SizeField {
    fn bytes(&self) -> u64 {
        match self {
            SizeField::Bytes(b) => *b,
            SizeField::Text(t) => parse_size(t).unwrap_or(0),
            SizeField::Other(_) => 0,
        }
    }
}

impl ImageRecord {
    fn into_image(self) -> Image {
        Image {
            repository: non_empty(self.repository, "<none>"),
            tag: non_empty(self.tag, "<none>"),
            id: short_id(&self.id.unwrap_or_default()),
            created: self.created.filter(|c| !c.is_empty()),
            size_bytes: self.size.as_ref().map_or(0, SizeField::bytes),
        }
    }
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

const STRATEGIES: &[Strategy<Vec<Image>>] = &[
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

fn from_json_lines(raw: &RawInvocation) -> Option<Vec<Image>> {
    let records: Vec<ImageRecord> = json_lines(&raw.stdout);
    (!records.is_empty()).then(|| records.into_iter().map(ImageRecord::into_image).collect())
}

fn from_json_array(raw: &RawInvocation) -> Option<Vec<Image>> {
    let records: Vec<ImageRecord> = json_array(&raw.stdout)?;
    Some(records.into_iter().map(ImageRecord::into_image).collect())
}

fn from_table(raw: &RawInvocation) -> Option<Vec<Image>> {
    let mut lines = raw.stdout.lines().skip_while(|l| !l.contains("REPOSITORY"));
    let layout = ColumnLayout::from_header(lines.next()?)?;
    let images = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| Image {
            repository: non_empty(Some(layout.cell(line, "REPOSITORY").to_string()), "<none>"),
            tag: non_empty(Some(layout.cell(line, "TAG").to_string()), "<none>"),
            id: short_id(layout.cell(line, "IMAGE ID")),
            created: Some(layout.cell(line, "CREATED").to_string()).filter(|c| !c.is_empty()),
            size_bytes: parse_size(layout.cell(line, "SIZE")).unwrap_or(0),
        })
        .collect();
    Some(images)
}

/// Parse `docker images` output.
pub fn parse_images(raw: &RawInvocation) -> DockerImages {
    let images = first_success(raw, STRATEGIES).unwrap_or_default();
    DockerImages {
        outcome: Outcome::from_invocation(raw, &DOCKER_ERRORS),
        total: images.len(),
        total_size_bytes: images.iter().map(|i| i.size_bytes).sum(),
        images,
    }
}

impl Present for DockerImages {
    type Compact = DockerImagesCompact;

    fn format_full(&self) -> String {
        let mut out = format!(
            "docker images: {}, {} image(s), {}\n",
            self.outcome.headline(),
            self.total,
            format_bytes(self.total_size_bytes)
        );
        for image in &self.images {
            out.push_str(&format!(
                "{} {} {}{}\n",
                image.id,
                image.reference(),
                format_bytes(image.size_bytes),
                image
                    .created
                    .as_deref()
                    .map(|c| format!(" (created {c})"))
                    .unwrap_or_default()
            ));
        }
        out
    }

    fn project_compact(&self) -> DockerImagesCompact {
        DockerImagesCompact {
            outcome: self.outcome.clone(),
            images: cap_map(&self.images, COMPACT_LIST_LIMIT, |i| ImageSummary {
                reference: i.reference(),
                id: i.id.clone(),
                size_bytes: i.size_bytes,
            }),
            total: self.total,
            total_size_bytes: self.total_size_bytes,
        }
    }

    fn format_compact(compact: &DockerImagesCompact) -> String {
        let mut out = format!(
            "docker images: {}, {} image(s), {}\n",
            compact.outcome.headline(),
            compact.total,
            format_bytes(compact.total_size_bytes)
        );
        for image in &compact.images {
            out.push_str(&format!("{} {}\n", image.reference, format_bytes(image.size_bytes)));
        }
        if let Some(more) = more_line(compact.total, compact.images.len()) {
            out.push_str(&more);
            out.push('\n');
        }
        out
    }
}

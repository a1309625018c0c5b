//! Parser dispatch shared by live commands and `toolshape parse`.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use toolshape_core::domains::build::{parse_cargo_build, parse_dotnet_build};
use toolshape_core::domains::docker::{
    parse_compose, parse_images, parse_ps, parse_pull, parse_run, ComposeAction, ComposeContext,
};
use toolshape_core::domains::gh::{parse_pr_action, parse_pr_view, PrActionKind};
use toolshape_core::domains::git::{parse_log, parse_push, parse_status};
use toolshape_core::domains::helm::{parse_helm, HelmAction};
use toolshape_core::domains::http::parse_http;
use toolshape_core::domains::kubectl::{parse_get, GetContext};
use toolshape_core::domains::npm::parse_install;
use toolshape_core::{Present, PresentOptions, RawInvocation, Representation};

/// Every parseable tool action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    DockerPs,
    DockerImages,
    DockerComposeUp,
    DockerComposeDown,
    DockerPull,
    DockerRun,
    GitLog,
    GitStatus,
    GitPush,
    KubectlGet,
    NpmInstall,
    DotnetBuild,
    CargoBuild,
    HelmList,
    HelmStatus,
    HelmInstall,
    HelmUpgrade,
    HelmUninstall,
    GhPrView,
    GhPrClose,
    GhPrMerge,
    Http,
}

/// Request values some parsers need because the tool output leaves them out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub image: Option<String>,
    pub name: Option<String>,
    pub project: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub resource: Option<String>,
    pub namespace: Option<String>,
    pub release: Option<String>,
}

/// A presented result, ready to print.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    #[serde(skip)]
    pub representation: Representation,
    pub structured: serde_json::Value,
    pub text: String,
}

impl Rendered {
    fn from_result<T: Present>(result: T, raw: &RawInvocation, options: PresentOptions) -> Result<Self> {
        let presented = options.present(result, &raw.raw_text());
        Ok(Self {
            representation: presented.representation(),
            structured: serde_json::to_value(&presented.structured)
                .context("failed to serialize structured result")?,
            text: presented.text,
        })
    }
}

impl Target {
    /// Parse `raw` as this action's output and present it.
    pub fn render(self, raw: &RawInvocation, ctx: &RequestContext, options: PresentOptions) -> Result<Rendered> {
        let release = ctx.release.as_deref();
        match self {
            Target::DockerPs => Rendered::from_result(parse_ps(raw), raw, options),
            Target::DockerImages => Rendered::from_result(parse_images(raw), raw, options),
            Target::DockerComposeUp | Target::DockerComposeDown => {
                let compose = ComposeContext {
                    action: Some(if self == Target::DockerComposeUp {
                        ComposeAction::Up
                    } else {
                        ComposeAction::Down
                    }),
                    project: ctx.project.clone(),
                };
                Rendered::from_result(parse_compose(raw, &compose), raw, options)
            }
            Target::DockerPull => {
                let image = ctx.image.as_deref().unwrap_or_default();
                Rendered::from_result(parse_pull(raw, image), raw, options)
            }
            Target::DockerRun => {
                let image = ctx.image.as_deref().unwrap_or_default();
                Rendered::from_result(parse_run(raw, image, ctx.name.as_deref()), raw, options)
            }
            Target::GitLog => Rendered::from_result(parse_log(raw), raw, options),
            Target::GitStatus => Rendered::from_result(parse_status(raw), raw, options),
            Target::GitPush => Rendered::from_result(
                parse_push(raw, ctx.remote.as_deref(), ctx.branch.as_deref()),
                raw,
                options,
            ),
            Target::KubectlGet => {
                let get = GetContext {
                    resource: ctx.resource.clone(),
                    namespace: ctx.namespace.clone(),
                };
                Rendered::from_result(parse_get(raw, &get), raw, options)
            }
            Target::NpmInstall => Rendered::from_result(parse_install(raw), raw, options),
            Target::DotnetBuild => Rendered::from_result(parse_dotnet_build(raw), raw, options),
            Target::CargoBuild => Rendered::from_result(parse_cargo_build(raw), raw, options),
            Target::HelmList => Rendered::from_result(parse_helm(HelmAction::List, raw, release), raw, options),
            Target::HelmStatus => Rendered::from_result(parse_helm(HelmAction::Status, raw, release), raw, options),
            Target::HelmInstall => {
                Rendered::from_result(parse_helm(HelmAction::Install, raw, release), raw, options)
            }
            Target::HelmUpgrade => {
                Rendered::from_result(parse_helm(HelmAction::Upgrade, raw, release), raw, options)
            }
            Target::HelmUninstall => {
                Rendered::from_result(parse_helm(HelmAction::Uninstall, raw, release), raw, options)
            }
            Target::GhPrView => Rendered::from_result(parse_pr_view(raw), raw, options),
            Target::GhPrClose => Rendered::from_result(parse_pr_action(PrActionKind::Close, raw), raw, options),
            Target::GhPrMerge => Rendered::from_result(parse_pr_action(PrActionKind::Merge, raw), raw, options),
            Target::Http => Rendered::from_result(parse_http(raw), raw, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_target_renders_empty_output() {
        let raw = RawInvocation::new("", "", 0);
        for target in Target::value_variants() {
            let rendered = target
                .render(&raw, &RequestContext::default(), PresentOptions::default())
                .unwrap();
            assert_eq!(rendered.structured["success"], true, "{target:?}");
        }
    }

    #[test]
    fn test_force_full_is_honoured() {
        let raw = RawInvocation::new("## main\n", "", 0);
        let options = PresentOptions { force_full: true };
        let rendered = Target::GitStatus
            .render(&raw, &RequestContext::default(), options)
            .unwrap();
        assert_eq!(rendered.representation, Representation::Full);
    }

    #[test]
    fn test_target_names_are_kebab_case() {
        let target = Target::from_str("docker-compose-up", false).unwrap();
        assert_eq!(target, Target::DockerComposeUp);
        assert_eq!(Target::from_str("gh-pr-merge", false).unwrap(), Target::GhPrMerge);
    }
}

//! Turn a parsed command line into a guarded invocation plan.
//!
//! Building a plan runs every guard for the action. Nothing is spawned until
//! a plan exists, so a rejected argument never reaches the runner.

use toolshape_core::domains::build::{cargo_build_args, dotnet_build_args, BuildArgs};
use toolshape_core::domains::docker::args::{
    compose_down_args, compose_up_args, images_args, ps_args, pull_args, run_args,
};
use toolshape_core::domains::docker::{ComposeArgs, RunArgs};
use toolshape_core::domains::gh::{pr_close_args, pr_merge_args, pr_view_args, MergeMethod, PrArgs};
use toolshape_core::domains::git::{log_args, push_args, status_args, LogArgs, PushArgs};
use toolshape_core::domains::helm::{helm_args, HelmAction, HelmArgs};
use toolshape_core::domains::http::{curl_args, HttpArgs};
use toolshape_core::domains::kubectl::{get_args, GetArgs};
use toolshape_core::domains::npm::{install_args, InstallArgs};
use toolshape_core::GuardResult;

use crate::cli::{
    BuildAction, ChartOpts, ComposeCommand, ComposeOpts, DockerAction, GhAction, GitAction, HelmCommand,
    KubectlAction, NpmAction, PrCommand, PrOpts, ToolCommand,
};
use crate::target::{RequestContext, Target};

/// A guarded command ready for the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub program: &'static str,
    pub argv: Vec<String>,
    pub target: Target,
    pub context: RequestContext,
}

impl Plan {
    fn new(program: &'static str, argv: Vec<String>, target: Target) -> Self {
        Self {
            program,
            argv,
            target,
            context: RequestContext::default(),
        }
    }

    fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

pub fn plan(command: ToolCommand) -> GuardResult<Plan> {
    match command {
        ToolCommand::Docker { action } => docker(action),
        ToolCommand::Git { action } => git(action),
        ToolCommand::Kubectl {
            action:
                KubectlAction::Get {
                    resource,
                    name,
                    namespace,
                    all_namespaces,
                    selector,
                },
        } => {
            let args = GetArgs {
                resource,
                name,
                namespace,
                all_namespaces,
                selector,
            };
            let context = RequestContext {
                resource: Some(args.resource.clone()),
                namespace: args.namespace.clone(),
                ..Default::default()
            };
            Ok(Plan::new("kubectl", get_args(&args)?, Target::KubectlGet).with_context(context))
        }
        ToolCommand::Npm {
            action: NpmAction::Install { packages, dev },
        } => Ok(Plan::new(
            "npm",
            install_args(&InstallArgs { packages, dev })?,
            Target::NpmInstall,
        )),
        ToolCommand::Dotnet { action } => {
            Ok(Plan::new("dotnet", dotnet_build_args(&build_args(action))?, Target::DotnetBuild))
        }
        ToolCommand::Cargo { action } => {
            Ok(Plan::new("cargo", cargo_build_args(&build_args(action))?, Target::CargoBuild))
        }
        ToolCommand::Helm { action } => helm(action),
        ToolCommand::Gh {
            action: GhAction::Pr { action },
        } => gh(action),
        ToolCommand::Http(opts) => {
            let args = HttpArgs {
                url: opts.url,
                method: opts.method,
                headers: opts.headers,
                body: opts.data,
                follow_redirects: opts.location,
            };
            Ok(Plan::new("curl", curl_args(&args)?, Target::Http))
        }
    }
}

fn docker(action: DockerAction) -> GuardResult<Plan> {
    match action {
        DockerAction::Ps { all } => Ok(Plan::new("docker", ps_args(all), Target::DockerPs)),
        DockerAction::Images { repository } => Ok(Plan::new(
            "docker",
            images_args(repository.as_deref())?,
            Target::DockerImages,
        )),
        DockerAction::Pull { image } => {
            let argv = pull_args(&image)?;
            Ok(Plan::new("docker", argv, Target::DockerPull).with_context(RequestContext {
                image: Some(image),
                ..Default::default()
            }))
        }
        DockerAction::Run(opts) => {
            let args = RunArgs {
                image: opts.image,
                name: opts.name,
                ports: opts.ports,
                volumes: opts.volumes,
                env: opts.env,
                workdir: opts.workdir,
                command: opts.command,
            };
            let argv = run_args(&args)?;
            Ok(Plan::new("docker", argv, Target::DockerRun).with_context(RequestContext {
                image: Some(args.image),
                name: args.name,
                ..Default::default()
            }))
        }
        DockerAction::Compose { action } => match action {
            ComposeCommand::Up { opts, services } => {
                let args = compose_args(opts, services);
                Ok(Plan::new("docker", compose_up_args(&args)?, Target::DockerComposeUp)
                    .with_context(compose_context(args)))
            }
            ComposeCommand::Down { opts, volumes } => {
                let args = compose_args(opts, Vec::new());
                Ok(Plan::new("docker", compose_down_args(&args, volumes)?, Target::DockerComposeDown)
                    .with_context(compose_context(args)))
            }
        },
    }
}

fn compose_args(opts: ComposeOpts, services: Vec<String>) -> ComposeArgs {
    ComposeArgs {
        file: opts.file,
        project: opts.project,
        services,
    }
}

fn compose_context(args: ComposeArgs) -> RequestContext {
    RequestContext {
        project: args.project,
        ..Default::default()
    }
}

fn git(action: GitAction) -> GuardResult<Plan> {
    match action {
        GitAction::Log {
            max_count,
            revision,
            paths,
        } => {
            let args = LogArgs {
                max_count,
                revision,
                paths,
            };
            Ok(Plan::new("git", log_args(&args)?, Target::GitLog))
        }
        GitAction::Status { paths } => Ok(Plan::new("git", status_args(&paths)?, Target::GitStatus)),
        GitAction::Push {
            remote,
            branch,
            set_upstream,
            force_with_lease,
        } => {
            let args = PushArgs {
                remote,
                branch,
                set_upstream,
                force_with_lease,
            };
            let argv = push_args(&args)?;
            let remote = match (&args.remote, &args.branch) {
                (None, Some(_)) => Some("origin".to_string()),
                (remote, _) => remote.clone(),
            };
            Ok(Plan::new("git", argv, Target::GitPush).with_context(RequestContext {
                remote,
                branch: args.branch,
                ..Default::default()
            }))
        }
    }
}

fn build_args(action: BuildAction) -> BuildArgs {
    let BuildAction::Build {
        project,
        configuration,
        release,
    } = action;
    BuildArgs {
        project,
        configuration,
        release,
    }
}

fn helm(command: HelmCommand) -> GuardResult<Plan> {
    let (action, args) = match command {
        HelmCommand::List { helm } => (
            HelmAction::List,
            HelmArgs {
                namespace: helm.namespace,
                ..Default::default()
            },
        ),
        HelmCommand::Status { release, helm } => (
            HelmAction::Status,
            HelmArgs {
                release: Some(release),
                namespace: helm.namespace,
                ..Default::default()
            },
        ),
        HelmCommand::Install(opts) => (HelmAction::Install, chart_args(opts)),
        HelmCommand::Upgrade(opts) => (HelmAction::Upgrade, chart_args(opts)),
        HelmCommand::Uninstall { release, helm } => (
            HelmAction::Uninstall,
            HelmArgs {
                release: Some(release),
                namespace: helm.namespace,
                ..Default::default()
            },
        ),
    };

    let target = match action {
        HelmAction::List => Target::HelmList,
        HelmAction::Status => Target::HelmStatus,
        HelmAction::Install => Target::HelmInstall,
        HelmAction::Upgrade => Target::HelmUpgrade,
        HelmAction::Uninstall => Target::HelmUninstall,
    };
    let argv = helm_args(action, &args)?;
    Ok(Plan::new("helm", argv, target).with_context(RequestContext {
        release: args.release,
        namespace: args.namespace,
        ..Default::default()
    }))
}

fn chart_args(opts: ChartOpts) -> HelmArgs {
    HelmArgs {
        release: Some(opts.release),
        chart: Some(opts.chart),
        namespace: opts.helm.namespace,
        version: opts.version,
        set: opts.set,
        values_files: opts.values_files,
    }
}

fn gh(command: PrCommand) -> GuardResult<Plan> {
    match command {
        PrCommand::View(pr) => Ok(Plan::new("gh", pr_view_args(&pr_args(pr))?, Target::GhPrView)),
        PrCommand::Close {
            pr,
            comment,
            delete_branch,
        } => {
            let args = PrArgs {
                comment,
                delete_branch,
                ..pr_args(pr)
            };
            Ok(Plan::new("gh", pr_close_args(&args)?, Target::GhPrClose))
        }
        PrCommand::Merge {
            pr,
            squash,
            rebase,
            delete_branch,
        } => {
            let method = if squash {
                MergeMethod::Squash
            } else if rebase {
                MergeMethod::Rebase
            } else {
                MergeMethod::Merge
            };
            let args = PrArgs {
                method,
                delete_branch,
                ..pr_args(pr)
            };
            Ok(Plan::new("gh", pr_merge_args(&args)?, Target::GhPrMerge))
        }
    }
}

fn pr_args(pr: PrOpts) -> PrArgs {
    PrArgs {
        selector: pr.selector,
        repo: pr.repo,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use toolshape_core::GuardError;

    fn plan_for(argv: &[&str]) -> GuardResult<Plan> {
        let mut full = vec!["toolshape"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Tool(tool) => plan(tool),
            Commands::Parse(_) => panic!("expected a tool command"),
        }
    }

    #[test]
    fn test_docker_run_plan_carries_context() {
        let plan = plan_for(&["docker", "run", "nginx", "--name", "web", "-p", "8080:80"]).unwrap();
        assert_eq!(plan.program, "docker");
        assert_eq!(plan.target, Target::DockerRun);
        assert_eq!(plan.context.image.as_deref(), Some("nginx"));
        assert_eq!(plan.context.name.as_deref(), Some("web"));
    }

    #[test]
    fn test_unsafe_volume_is_rejected_before_planning() {
        let err = plan_for(&["docker", "run", "alpine", "-v", "/etc:/host"]).unwrap_err();
        assert!(matches!(err, GuardError::UnsafeVolumeMount { .. }));
    }

    #[test]
    fn test_git_push_branch_only_defaults_remote() {
        let plan = plan_for(&["git", "push", "--", "-f"]);
        assert!(plan.is_err());

        let plan = plan_for(&["git", "push", "origin", "feature/x", "-u"]).unwrap();
        assert_eq!(plan.context.remote.as_deref(), Some("origin"));
        assert_eq!(plan.context.branch.as_deref(), Some("feature/x"));
        assert!(plan.argv.contains(&"--set-upstream".to_string()));
    }

    #[test]
    fn test_kubectl_plan_requests_json() {
        let plan = plan_for(&["kubectl", "get", "pods", "-n", "prod"]).unwrap();
        assert_eq!(plan.argv.last().map(String::as_str), Some("json"));
        assert_eq!(plan.context.resource.as_deref(), Some("pods"));
        assert_eq!(plan.context.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_helm_install_plan() {
        let plan = plan_for(&["helm", "install", "web", "bitnami/nginx", "--set", "replicaCount=2"]).unwrap();
        assert_eq!(plan.target, Target::HelmInstall);
        assert_eq!(plan.context.release.as_deref(), Some("web"));
        assert_eq!(plan.argv[..3], ["install", "web", "bitnami/nginx"]);
    }

    #[test]
    fn test_gh_merge_method_flags() {
        let plan = plan_for(&["gh", "pr", "merge", "42", "--squash"]).unwrap();
        assert!(plan.argv.contains(&"--squash".to_string()));
    }

    #[test]
    fn test_http_rejects_file_scheme() {
        let err = plan_for(&["http", "file:///etc/passwd"]).unwrap_err();
        assert!(matches!(err, GuardError::UnsafeUrl { .. }));
    }
}

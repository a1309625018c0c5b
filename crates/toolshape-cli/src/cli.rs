//! Command-line definitions.

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};

use toolshape_core::domains::http::Header;

use crate::target::Target;

#[derive(Parser)]
#[command(name = "toolshape")]
#[command(author = "Stevedores Org")]
#[command(version = toolshape_core::VERSION)]
#[command(about = "Run CLI tools and normalize their output into structured results", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Always return the full representation
    #[arg(long, global = true, env = "TOOLSHAPE_FULL", value_parser = FalseyValueParser::new())]
    pub full: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Kill the wrapped tool after this many milliseconds
    #[arg(long, global = true, env = "TOOLSHAPE_TIMEOUT_MS", default_value_t = 60_000)]
    pub timeout_ms: u64,

    /// Working directory for the wrapped tool
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The selected text rendering
    Text,
    /// `{structured, text}` JSON envelope
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Tool(ToolCommand),

    /// Normalize previously captured output without running anything
    Parse(ParseOpts),
}

/// Commands that run a wrapped tool.
#[derive(Subcommand)]
pub enum ToolCommand {
    /// Docker and Docker Compose
    Docker {
        #[command(subcommand)]
        action: DockerAction,
    },

    /// Git
    Git {
        #[command(subcommand)]
        action: GitAction,
    },

    /// kubectl
    Kubectl {
        #[command(subcommand)]
        action: KubectlAction,
    },

    /// npm
    Npm {
        #[command(subcommand)]
        action: NpmAction,
    },

    /// dotnet build
    Dotnet {
        #[command(subcommand)]
        action: BuildAction,
    },

    /// cargo build
    Cargo {
        #[command(subcommand)]
        action: BuildAction,
    },

    /// Helm releases
    Helm {
        #[command(subcommand)]
        action: HelmCommand,
    },

    /// GitHub CLI pull requests
    Gh {
        #[command(subcommand)]
        action: GhAction,
    },

    /// HTTP request through curl
    Http(HttpOpts),
}

// ---------------------------------------------------------------------------
// docker
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum DockerAction {
    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// List images
    Images {
        /// Only images from this repository
        repository: Option<String>,
    },

    /// Pull an image
    Pull { image: String },

    /// Start a detached container
    Run(DockerRunOpts),

    /// Docker Compose
    Compose {
        #[command(subcommand)]
        action: ComposeCommand,
    },
}

#[derive(Args)]
pub struct DockerRunOpts {
    pub image: String,

    #[arg(long)]
    pub name: Option<String>,

    /// Port mapping, e.g. 8080:80
    #[arg(short = 'p', long = "publish")]
    pub ports: Vec<String>,

    /// Volume mount, e.g. ./data:/data
    #[arg(short = 'v', long = "volume")]
    pub volumes: Vec<String>,

    /// Environment variable KEY=VALUE
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    #[arg(short = 'w', long)]
    pub workdir: Option<String>,

    /// Command passed to the container
    #[arg(last = true)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct ComposeOpts {
    /// Compose file
    #[arg(short = 'f', long)]
    pub file: Option<String>,

    /// Project name
    #[arg(short = 'p', long = "project-name")]
    pub project: Option<String>,
}

#[derive(Subcommand)]
pub enum ComposeCommand {
    /// Create and start services
    Up {
        #[command(flatten)]
        opts: ComposeOpts,
        services: Vec<String>,
    },

    /// Stop and remove services
    Down {
        #[command(flatten)]
        opts: ComposeOpts,
        /// Also remove named volumes
        #[arg(long)]
        volumes: bool,
    },
}

// ---------------------------------------------------------------------------
// git
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum GitAction {
    /// Commit history
    Log {
        /// Maximum number of commits
        #[arg(short = 'n', long, default_value = "20")]
        max_count: usize,

        /// Revision or range
        revision: Option<String>,

        /// Limit to these paths
        #[arg(last = true)]
        paths: Vec<String>,
    },

    /// Working tree status
    Status { paths: Vec<String> },

    /// Push a branch
    Push {
        remote: Option<String>,
        branch: Option<String>,

        #[arg(short = 'u', long)]
        set_upstream: bool,

        #[arg(long)]
        force_with_lease: bool,
    },
}

// ---------------------------------------------------------------------------
// kubectl / npm / build
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum KubectlAction {
    /// Get resources
    Get {
        resource: String,
        name: Option<String>,

        #[arg(short = 'n', long)]
        namespace: Option<String>,

        #[arg(short = 'A', long)]
        all_namespaces: bool,

        /// Label selector
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NpmAction {
    /// Install dependencies or the given packages
    Install {
        packages: Vec<String>,

        #[arg(short = 'D', long = "save-dev")]
        dev: bool,
    },
}

#[derive(Subcommand)]
pub enum BuildAction {
    /// Build a project
    Build {
        /// Project/solution for dotnet, manifest path for cargo
        project: Option<String>,

        #[arg(short = 'c', long)]
        configuration: Option<String>,

        #[arg(short, long)]
        release: bool,
    },
}

// ---------------------------------------------------------------------------
// helm / gh / http
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct HelmOpts {
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
}

#[derive(Args)]
pub struct ChartOpts {
    pub release: String,
    pub chart: String,

    #[arg(long)]
    pub version: Option<String>,

    /// key=value override
    #[arg(long)]
    pub set: Vec<String>,

    /// Values file
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<String>,

    #[command(flatten)]
    pub helm: HelmOpts,
}

#[derive(Subcommand)]
pub enum HelmCommand {
    /// List releases
    List {
        #[command(flatten)]
        helm: HelmOpts,
    },

    /// Show a release
    Status {
        release: String,
        #[command(flatten)]
        helm: HelmOpts,
    },

    /// Install a chart
    Install(ChartOpts),

    /// Upgrade a release
    Upgrade(ChartOpts),

    /// Remove a release
    Uninstall {
        release: String,
        #[command(flatten)]
        helm: HelmOpts,
    },
}

#[derive(Subcommand)]
pub enum GhAction {
    /// Pull requests
    Pr {
        #[command(subcommand)]
        action: PrCommand,
    },
}

#[derive(Args)]
pub struct PrOpts {
    /// Number, URL, or branch
    pub selector: String,

    #[arg(short = 'R', long)]
    pub repo: Option<String>,
}

#[derive(Subcommand)]
pub enum PrCommand {
    /// Show a pull request
    View(PrOpts),

    /// Close a pull request
    Close {
        #[command(flatten)]
        pr: PrOpts,

        #[arg(short, long)]
        comment: Option<String>,

        #[arg(short, long)]
        delete_branch: bool,
    },

    /// Merge a pull request
    Merge {
        #[command(flatten)]
        pr: PrOpts,

        #[arg(short, long, conflicts_with = "rebase")]
        squash: bool,

        #[arg(short, long)]
        rebase: bool,

        #[arg(short, long)]
        delete_branch: bool,
    },
}

#[derive(Args)]
pub struct HttpOpts {
    pub url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header, "Name: value"
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<Header>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Follow redirects
    #[arg(short = 'L', long)]
    pub location: bool,
}

fn parse_header(value: &str) -> Result<Header, String> {
    let (name, value) = value
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {value:?}"))?;
    Ok(Header {
        name: name.trim().to_string(),
        value: value.trim().to_string(),
    })
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ParseOpts {
    /// Which tool action produced the output
    #[arg(value_enum)]
    pub target: Target,

    /// File holding the captured stdout
    #[arg(long)]
    pub stdout: PathBuf,

    /// File holding the captured stderr
    #[arg(long)]
    pub stderr: Option<PathBuf>,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub exit_code: i32,

    /// The run was killed at its timeout
    #[arg(long)]
    pub timed_out: bool,

    #[arg(long)]
    pub image: Option<String>,

    /// Container name (docker run)
    #[arg(long)]
    pub name: Option<String>,

    /// Compose project name
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub remote: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    /// Requested kubectl resource type
    #[arg(long)]
    pub resource: Option<String>,

    #[arg(long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub release: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_docker_run_trailing_command() {
        let cli = Cli::try_parse_from([
            "toolshape", "docker", "run", "nginx", "-p", "8080:80", "--", "nginx", "-g", "daemon off;",
        ])
        .unwrap();
        match cli.command {
            Commands::Tool(ToolCommand::Docker {
                action: DockerAction::Run(opts),
            }) => {
                assert_eq!(opts.image, "nginx");
                assert_eq!(opts.ports, vec!["8080:80"]);
                assert_eq!(opts.command, vec!["nginx", "-g", "daemon off;"]);
            }
            _ => panic!("expected docker run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["toolshape", "git", "status", "--format", "json", "--full"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.full);
    }

    #[test]
    fn test_header_values_split_on_first_colon() {
        let header = parse_header("Authorization: Bearer a:b").unwrap();
        assert_eq!(header.name, "Authorization");
        assert_eq!(header.value, "Bearer a:b");
        assert!(parse_header("no-colon").is_err());
    }

    #[test]
    fn test_parse_accepts_negative_exit_code() {
        let cli = Cli::try_parse_from([
            "toolshape", "parse", "git-status", "--stdout", "out.txt", "--exit-code", "-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Parse(opts) => {
                assert_eq!(opts.target, Target::GitStatus);
                assert_eq!(opts.exit_code, -1);
            }
            _ => panic!("expected parse"),
        }
    }
}

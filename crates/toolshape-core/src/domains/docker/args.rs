//! Guarded argument builders for docker commands.
//!
//! Each builder validates caller-supplied values first and only then
//! assembles the argv, so a rejected value never reaches a process.

use serde::{Deserialize, Serialize};

use crate::guard::{
    assert_no_flag_injection, assert_no_flag_injection_all, assert_safe_volume_mount,
    assert_valid_port_mapping, GuardResult,
};

/// Caller parameters for `docker run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArgs {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    /// Arguments handed to the container entrypoint after the image.
    #[serde(default)]
    pub command: Vec<String>,
}

/// `docker run -d ...`
pub fn run_args(args: &RunArgs) -> GuardResult<Vec<String>> {
    assert_no_flag_injection(&args.image, "image")?;
    if let Some(name) = &args.name {
        assert_no_flag_injection(name, "name")?;
    }
    if let Some(workdir) = &args.workdir {
        assert_no_flag_injection(workdir, "workdir")?;
    }
    for port in &args.ports {
        assert_valid_port_mapping(port)?;
    }
    for volume in &args.volumes {
        assert_no_flag_injection(volume, "volume")?;
        assert_safe_volume_mount(volume)?;
    }
    assert_no_flag_injection_all(&args.env, "env")?;

    let mut argv = vec!["run".to_string(), "-d".to_string()];
    if let Some(name) = &args.name {
        argv.push("--name".to_string());
        argv.push(name.clone());
    }
    if let Some(workdir) = &args.workdir {
        argv.push("--workdir".to_string());
        argv.push(workdir.clone());
    }
    for port in &args.ports {
        argv.push("-p".to_string());
        argv.push(port.clone());
    }
    for volume in &args.volumes {
        argv.push("-v".to_string());
        argv.push(volume.clone());
    }
    for env in &args.env {
        argv.push("-e".to_string());
        argv.push(env.clone());
    }
    argv.push(args.image.clone());
    argv.extend(args.command.iter().cloned());
    Ok(argv)
}

/// `docker ps --format '{{json .}}'`
pub fn ps_args(all: bool) -> Vec<String> {
    let mut argv = vec!["ps".to_string()];
    if all {
        argv.push("--all".to_string());
    }
    argv.push("--no-trunc".to_string());
    argv.push("--format".to_string());
    argv.push("{{json .}}".to_string());
    argv
}

/// `docker images --format '{{json .}}' [repository]`
pub fn images_args(repository: Option<&str>) -> GuardResult<Vec<String>> {
    let mut argv = vec![
        "images".to_string(),
        "--format".to_string(),
        "{{json .}}".to_string(),
    ];
    if let Some(repo) = repository {
        assert_no_flag_injection(repo, "repository")?;
        argv.push(repo.to_string());
    }
    Ok(argv)
}

/// `docker pull <image>`
pub fn pull_args(image: &str) -> GuardResult<Vec<String>> {
    assert_no_flag_injection(image, "image")?;
    Ok(vec!["pull".to_string(), image.to_string()])
}

/// Caller parameters for `docker compose up/down`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeArgs {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

impl ComposeArgs {
    fn prefix(&self) -> GuardResult<Vec<String>> {
        let mut argv = vec!["compose".to_string()];
        if let Some(file) = &self.file {
            assert_no_flag_injection(file, "file")?;
            argv.push("-f".to_string());
            argv.push(file.clone());
        }
        if let Some(project) = &self.project {
            assert_no_flag_injection(project, "project")?;
            argv.push("-p".to_string());
            argv.push(project.clone());
        }
        Ok(argv)
    }
}

/// `docker compose up -d [services]`
pub fn compose_up_args(args: &ComposeArgs) -> GuardResult<Vec<String>> {
    assert_no_flag_injection_all(&args.services, "services")?;
    let mut argv = args.prefix()?;
    argv.push("up".to_string());
    argv.push("-d".to_string());
    argv.extend(args.services.iter().cloned());
    Ok(argv)
}

/// `docker compose down [--volumes]`
pub fn compose_down_args(args: &ComposeArgs, volumes: bool) -> GuardResult<Vec<String>> {
    let mut argv = args.prefix()?;
    argv.push("down".to_string());
    if volumes {
        argv.push("--volumes".to_string());
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardError;

    fn nginx() -> RunArgs {
        RunArgs {
            image: "nginx:latest".to_string(),
            name: Some("web".to_string()),
            ports: vec!["8080:80/tcp".to_string()],
            volumes: vec!["./site:/usr/share/nginx/html:ro".to_string()],
            env: vec!["MODE=prod".to_string()],
            workdir: None,
            command: vec!["nginx".to_string(), "-g".to_string(), "daemon off;".to_string()],
        }
    }

    #[test]
    fn test_run_args_builds_argv() {
        let argv = run_args(&nginx()).unwrap();
        assert_eq!(&argv[..2], ["run", "-d"]);
        let image_pos = argv.iter().position(|a| a == "nginx:latest").unwrap();
        assert_eq!(&argv[image_pos + 1..], ["nginx", "-g", "daemon off;"]);
        assert!(argv.windows(2).any(|w| w == ["-p", "8080:80/tcp"]));
    }

    #[test]
    fn test_run_args_rejects_flag_image() {
        let mut args = nginx();
        args.image = "--privileged".to_string();
        assert!(matches!(run_args(&args), Err(GuardError::FlagInjection { .. })));
    }

    #[test]
    fn test_run_args_rejects_unsafe_volume_and_port() {
        let mut args = nginx();
        args.volumes = vec!["/var/run/docker.sock:/var/run/docker.sock".to_string()];
        assert!(matches!(run_args(&args), Err(GuardError::UnsafeVolumeMount { .. })));

        let mut args = nginx();
        args.ports = vec!["999999:80".to_string()];
        assert!(matches!(run_args(&args), Err(GuardError::InvalidPortMapping { .. })));
    }

    #[test]
    fn test_compose_args() {
        let args = ComposeArgs {
            file: Some("compose.yml".to_string()),
            project: None,
            services: vec!["api".to_string()],
        };
        assert_eq!(
            compose_up_args(&args).unwrap(),
            ["compose", "-f", "compose.yml", "up", "-d", "api"]
        );
        assert_eq!(compose_down_args(&args, true).unwrap(), ["compose", "-f", "compose.yml", "down", "--volumes"]);

        let bad = ComposeArgs {
            services: vec!["--build".to_string()],
            ..ComposeArgs::default()
        };
        assert!(compose_up_args(&bad).is_err());
    }

    #[test]
    fn test_ps_and_pull_args() {
        assert!(ps_args(true).contains(&"--all".to_string()));
        assert!(pull_args("-q").is_err());
        assert_eq!(pull_args("alpine").unwrap(), ["pull", "alpine"]);
        assert!(images_args(Some("--digests")).is_err());
    }
}

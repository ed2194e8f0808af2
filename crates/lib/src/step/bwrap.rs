use crate::artifact::{ArtifactStep, ArtifactStepSecret, get_env_key};
use crate::consts::{OUTPUT_ENV, SANDBOX_GID, SANDBOX_ROOTFS_DIRS, SANDBOX_UID, WORKSPACE_ENV};

use super::{step_environment, strict_script};

/// Bubblewrap-confined step, used for Linux targets.
///
/// All namespaces are unshared except the network. The build runs as
/// 1000:1000 with the rootfs artifact's system directories and every
/// dependency bound read-only at their own token path, so
/// `$VORPAL_ARTIFACT_<digest>` resolves the same inside and outside the
/// sandbox. Environment is passed only through `--setenv`; secrets are
/// re-exported by reference, so their values never appear in the arguments.
pub fn bwrap(
  arguments: Vec<String>,
  artifacts: Vec<String>,
  environments: Vec<String>,
  rootfs: Option<String>,
  script: &str,
  secrets: Vec<ArtifactStepSecret>,
) -> ArtifactStep {
  let env = step_environment(&artifacts, &environments);

  let mut args = arguments;
  args.extend(
    [
      "--unshare-all",
      "--share-net",
      "--clearenv",
      "--chdir",
      WORKSPACE_ENV,
      "--gid",
      SANDBOX_GID,
      "--uid",
      SANDBOX_UID,
      "--dev",
      "/dev",
      "--proc",
      "/proc",
      "--tmpfs",
      "/tmp",
      "--bind",
      OUTPUT_ENV,
      OUTPUT_ENV,
      "--bind",
      WORKSPACE_ENV,
      WORKSPACE_ENV,
      "--setenv",
      "VORPAL_OUTPUT",
      OUTPUT_ENV,
      "--setenv",
      "VORPAL_WORKSPACE",
      WORKSPACE_ENV,
    ]
    .map(String::from),
  );

  if let Some(rootfs) = &rootfs {
    let rootfs_key = get_env_key(rootfs);
    for dir in SANDBOX_ROOTFS_DIRS {
      args.push("--ro-bind".to_string());
      args.push(format!("{}/{}", rootfs_key, dir));
      args.push(format!("/{}", dir));
    }
  }

  for digest in &artifacts {
    let key = get_env_key(digest);
    args.push("--ro-bind".to_string());
    args.push(key.clone());
    args.push(key.clone());
    args.push("--setenv".to_string());
    args.push(key.trim_start_matches('$').to_string());
    args.push(key);
  }

  for (key, value) in env.variables {
    args.push("--setenv".to_string());
    args.push(key);
    args.push(value);
  }

  let mut secret_names: Vec<&str> = secrets.iter().map(|secret| secret.name.as_str()).collect();
  secret_names.sort_unstable();
  secret_names.dedup();
  for name in secret_names {
    args.push("--setenv".to_string());
    args.push(name.to_string());
    args.push(format!("${}", name));
  }

  args.push("--setenv".to_string());
  args.push("PATH".to_string());
  args.push(env.path);

  let mut step_artifacts = Vec::with_capacity(artifacts.len() + 1);
  step_artifacts.extend(rootfs);
  step_artifacts.extend(artifacts);

  ArtifactStep {
    entrypoint: Some("bwrap".to_string()),
    script: Some(strict_script(script)),
    arguments: args,
    artifacts: step_artifacts,
    environments: vec!["PATH=/bin:/usr/bin".to_string()],
    secrets,
  }
}

//! Shared constants.

pub const APP_NAME: &str = "vorpal";

/// Prefix of the indirection token that names a dependency's materialized path.
pub const ARTIFACT_ENV_PREFIX: &str = "VORPAL_ARTIFACT_";

pub const OUTPUT_ENV: &str = "$VORPAL_OUTPUT";
pub const WORKSPACE_ENV: &str = "$VORPAL_WORKSPACE";

/// PATH appended after declared and dependency entries.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/usr/sbin:/bin:/sbin";

/// Deterministic identity for sandboxed builds.
pub const SANDBOX_UID: &str = "1000";
pub const SANDBOX_GID: &str = "1000";

/// Directories bound read-only from the sandbox rootfs artifact.
pub const SANDBOX_ROOTFS_DIRS: [&str; 6] = ["bin", "etc", "lib", "lib64", "sbin", "usr"];

pub const DEFAULT_SANDBOX_ALIAS: &str = "library/linux-vorpal:latest";

pub const DEFAULT_AGENT: &str = "http://localhost:23151";
pub const DEFAULT_REGISTRY: &str = "http://localhost:23151";
pub const DEFAULT_PORT: u16 = 23152;

pub const DEFAULT_ALIAS_NAMESPACE: &str = "library";
pub const DEFAULT_ALIAS_TAG: &str = "latest";

/// Kind string passed to the registry's `Exists` check for source archives.
pub const SOURCE_ARCHIVE_KIND: &str = "source";

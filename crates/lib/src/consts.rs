//! Well-known names shared between the pipeline, the composer and the backend.

/// Image used to create tarballs of directory sources.
///
/// Needs `/bin/sh` and `tar` in `$PATH`.
pub const DEFAULT_TAR_IMAGE: &str = "busybox:latest";

/// Image used to apply patches. Needs `/bin/sh` and `patch` in `$PATH`.
pub const DEFAULT_PATCH_IMAGE: &str = "busybox:latest";

/// Directory all package sources are merged into.
pub const DEFAULT_SOURCES_DIR: &str = "/SOURCES";

/// Mount that archived sources are written to, independent of their final name.
pub const DEFAULT_ARCHIVE_BASE: &str = "/tmp/out";

/// Scratch file the compression step writes before it is moved into place.
pub const ARCHIVE_STAGING_FILE: &str = "/tmp/st";

/// Environment variable overriding [`DEFAULT_TAR_IMAGE`].
pub const TAR_IMAGE_ENV: &str = "GRAFT_TAR_IMAGE";

/// Environment variable overriding [`DEFAULT_PATCH_IMAGE`].
pub const PATCH_IMAGE_ENV: &str = "GRAFT_PATCH_IMAGE";

/// Result metadata key carrying a serialized image configuration.
pub const IMAGE_CONFIG_KEY: &str = "containerimage.config";

/// Local name of the main build context.
pub const LOCAL_NAME_CONTEXT: &str = "context";

/// Local name of the context holding the build descriptor file.
pub const LOCAL_NAME_DESCRIPTOR: &str = "dockerfile";

/// Descriptor file read by the frontend when bootstrapping.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "Dockerfile";

/// Frontend that builds from a descriptor file.
pub const DESCRIPTOR_FRONTEND: &str = "dockerfile.v0";

/// Generic frontend that runs whatever frontend image its `source` option names.
pub const GATEWAY_FRONTEND: &str = "gateway.v0";

/// Frontend option naming the frontend the gateway should run.
pub const GATEWAY_SOURCE_OPT: &str = "source";

/// Prefix of the frontend option mapping a named context to an input.
pub const CONTEXT_OPT_PREFIX: &str = "context:";

/// Prefix of an input reference in a frontend option value.
pub const INPUT_REF_PREFIX: &str = "input:";

/// Prefix of the frontend option carrying an input's metadata.
pub const INPUT_METADATA_OPT_PREFIX: &str = "input-metadata:";

/// Input id the locally built frontend is injected under.
pub const DEFAULT_FRONTEND_INPUT_ID: &str = "graft-frontend";

/// Environment variable holding comma separated exclude patterns for the
/// bootstrap build context.
pub const CONTEXT_EXCLUDES_ENV: &str = "GRAFT_CONTEXT_EXCLUDES";

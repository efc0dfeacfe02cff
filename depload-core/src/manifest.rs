//! Manifest Resolver
//!
//! Resolves dependency names from JSON manifests on disk. The manifest for
//! `name` lives at `<dir>/<name>.json`:
//!
//! ```json
//! { "dependencies": ["logger", "config"] }
//! ```
//!
//! A manifest without a `dependencies` field has no dependencies. Unknown
//! fields are ignored so manifests can carry whatever else the host needs.

use std::future::Future;
use std::path::{Path, PathBuf};

use futures_util::future::try_join_all;
use serde::Deserialize;
use tracing::trace;

use crate::error::{BoxError, Error, Result};
use crate::loader::Resolve;

/// Contents of one manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Resolver reading `<dir>/<name>.json` manifests.
///
/// All manifests requested in one batch are read concurrently.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    dir: PathBuf,
}

impl ManifestResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest for `name`.
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Read and parse the manifest for `name`.
    pub async fn manifest(&self, name: &str) -> Result<Manifest> {
        let path = self.manifest_path(name);
        trace!(path = %path.display(), "reading manifest");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(source) => return Err(Error::ManifestRead { path, source }),
        };

        serde_json::from_str(&content).map_err(|source| Error::ManifestParse { path, source })
    }
}

impl Resolve<String> for ManifestResolver {
    fn resolve(&self, names: Vec<String>) -> impl Future<Output = Result<Vec<Vec<String>>, BoxError>> + Send {
        async move {
            let manifests: Vec<Manifest> =
                try_join_all(names.iter().map(|name| self.manifest(name))).await?;
            Ok::<_, BoxError>(
                manifests
                    .into_iter()
                    .map(|manifest| manifest.dependencies)
                    .collect(),
            )
        }
    }
}

//! Collaborators supplied by the host and the adapters that turn their
//! answers into a `require('./...')` literal.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

// -----------------------------------------------------------------------------
// Host collaborators
// -----------------------------------------------------------------------------

/// The bundler's own module resolution.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    /// Absolute path of the entry module of `request` as seen from `context`.
    async fn resolve(&self, context: &Path, request: &str) -> anyhow::Result<PathBuf>;
}

/// The `bindings` package's lookup algorithm.
pub trait BindingsResolver: Send + Sync {
    /// Root directory of the package that owns `file`.
    fn module_root(&self, helper: &Path, file: &Path) -> anyhow::Result<PathBuf>;

    /// Absolute path of the addon described by `options`.
    fn locate(&self, helper: &Path, options: &BindingsOptions) -> anyhow::Result<PathBuf>;
}

/// The `node-gyp-build` package's `path()` lookup.
pub trait GypBuildResolver: Send + Sync {
    fn path(&self, helper: &Path, value: &Value) -> anyhow::Result<PathBuf>;
}

impl<F> GypBuildResolver for F
where
    F: Fn(&Path, &Value) -> anyhow::Result<PathBuf> + Send + Sync,
{
    fn path(&self, helper: &Path, value: &Value) -> anyhow::Result<PathBuf> {
        self(helper, value)
    }
}

/// Options record handed to [`BindingsResolver::locate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingsOptions {
    /// The evaluated call argument.
    pub bindings: Value,
    /// Ask for the file path instead of loading the addon.
    pub path: bool,
    pub module_root: PathBuf,
}

/// Everything the pipeline asks the host for.
#[derive(Clone, Copy)]
pub struct Resolvers<'a> {
    pub modules: &'a dyn ModuleResolver,
    pub bindings: &'a dyn BindingsResolver,
    pub gyp_build: &'a dyn GypBuildResolver,
}

// -----------------------------------------------------------------------------
// Literal rewrite
// -----------------------------------------------------------------------------

/// `target` relative to `module_dir`, always with forward slashes.
fn relative_request(module_dir: &Path, target: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(target, module_dir)?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

/// The text that replaces a matched call: `require('./<relative path>')`.
pub fn require_literal(module_dir: &Path, target: &Path) -> Option<String> {
    let relative = relative_request(module_dir, target)?;
    Some(format!("require('./{}')", relative.replace('\'', "\\'")))
}

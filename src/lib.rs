//! Bundler loader step for native Node.js addons.
//!
//! Finds `require('bindings')(...)` and `require('node-gyp-build')(...)` calls
//! in a module, works out which `.node` file each call would load at runtime,
//! and rewrites the call into `require('./<relative path>')` so the bundler
//! can pick the addon up like any other dependency. Source maps are kept in
//! step with the rewrite.

use sourcemap::SourceMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub mod config;
pub mod error;
pub mod eval;
pub mod idiom;
mod jspath;
pub mod resolve;
pub mod rewrite;
pub mod scanner;

pub use config::LoaderOptions;
pub use error::{LoaderError, Result};
pub use eval::{EvalError, Evaluator, ResolutionContext};
pub use idiom::Idiom;
pub use resolve::{
    require_literal, BindingsOptions, BindingsResolver, GypBuildResolver, ModuleResolver,
    Resolvers,
};
pub use rewrite::{RewriteBuffer, RewriteError, Rewritten};
pub use scanner::{CallSite, CallSites};

// -----------------------------------------------------------------------------
// Host boundary
// -----------------------------------------------------------------------------

/// One module handed over by the bundler.
#[derive(Debug, Clone, Copy)]
pub struct LoaderInput<'a> {
    /// Absolute path of the module file.
    pub resource_path: &'a Path,
    pub source: &'a str,
    /// Source map of `source`, as JSON.
    pub map: Option<&'a str>,
}

/// What goes back to the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOutput {
    pub code: String,
    /// Source map of `code`, as JSON.
    pub map: String,
}

// -----------------------------------------------------------------------------
// Pipeline
// -----------------------------------------------------------------------------

pub struct AddonRewriter<'r> {
    options: LoaderOptions,
    resolvers: Resolvers<'r>,
}

impl<'r> AddonRewriter<'r> {
    pub fn new(options: LoaderOptions, resolvers: Resolvers<'r>) -> Self {
        Self { options, resolvers }
    }

    /// Rewrites every enabled idiom in `source`, bindings first.
    ///
    /// Matches are handled one at a time and the first failure aborts the
    /// whole module; nothing is returned for a partially rewritten source.
    pub async fn rewrite(
        &self,
        resource_path: &Path,
        source: &str,
        input_map: Option<&str>,
    ) -> Result<Rewritten> {
        let input_map = input_map
            .map(|raw| SourceMap::from_slice(raw.as_bytes()))
            .transpose()?;
        let name = resource_path.to_string_lossy();
        let mut buffer =
            RewriteBuffer::new(source, &name).with_sources_content(self.options.sources_content);
        if let Some(map) = &input_map {
            buffer = buffer.with_input_map(map);
        }

        let module = ModuleScope::new(resource_path);
        for idiom in self.options.idioms() {
            self.rewrite_idiom(idiom, &module, &mut buffer).await?;
        }

        let rewritten = buffer.finish();
        debug!(
            module = %resource_path.display(),
            replacements = rewritten.replacements,
            "native addon rewrite finished"
        );
        Ok(rewritten)
    }

    async fn rewrite_idiom(
        &self,
        idiom: Idiom,
        module: &ModuleScope<'_>,
        buffer: &mut RewriteBuffer<'_>,
    ) -> Result<()> {
        let mut evaluator = Evaluator::new(&module.context, self.options.eval_budget);
        // resolved on the first match only
        let mut helper: Option<PathBuf> = None;

        for site in CallSites::new(buffer.source(), idiom) {
            let helper_path = match &helper {
                Some(path) => path.clone(),
                None => {
                    let path = self.resolve_helper(idiom, module).await?;
                    helper = Some(path.clone());
                    path
                }
            };

            let value = evaluator.evaluate(site.argument).map_err(|source| {
                LoaderError::Evaluation {
                    idiom,
                    module: module.file.to_path_buf(),
                    expression: site.argument.trim().to_string(),
                    source,
                }
            })?;
            trace!(%idiom, argument = site.argument, %value, "evaluated call argument");

            let resolution_error = |source| LoaderError::Resolution {
                idiom,
                module: module.file.to_path_buf(),
                source,
            };
            let target = idiom
                .locate(&self.resolvers, &helper_path, module.file, value)
                .map_err(resolution_error)?;
            let literal = require_literal(module.dir, &target).ok_or_else(|| {
                resolution_error(anyhow::anyhow!(
                    "{} has no path relative to {}",
                    target.display(),
                    module.dir.display()
                ))
            })?;

            debug!(
                %idiom,
                module = %module.file.display(),
                span = ?site.span,
                target = %target.display(),
                "rewriting native addon require"
            );
            buffer.replace(site.span, literal)?;
        }
        Ok(())
    }

    async fn resolve_helper(&self, idiom: Idiom, module: &ModuleScope<'_>) -> Result<PathBuf> {
        let helper = idiom.helper_package();
        let path = self
            .resolvers
            .modules
            .resolve(module.dir, helper)
            .await
            .map_err(|source| LoaderError::HelperResolution {
                idiom,
                helper,
                module: module.file.to_path_buf(),
                source,
            })?;
        debug!(%idiom, helper = %path.display(), "resolved helper package");
        Ok(path)
    }
}

/// Location facts about the module being rewritten.
struct ModuleScope<'a> {
    file: &'a Path,
    dir: &'a Path,
    context: ResolutionContext,
}

impl<'a> ModuleScope<'a> {
    fn new(file: &'a Path) -> Self {
        Self {
            file,
            dir: file.parent().unwrap_or_else(|| Path::new(".")),
            context: ResolutionContext::new(file),
        }
    }
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

/// Loader entry: rewrites one module with the host's JSON `options`.
pub async fn process_module(
    input: LoaderInput<'_>,
    options: Option<&str>,
    resolvers: Resolvers<'_>,
) -> Result<LoaderOutput> {
    let options = LoaderOptions::from_json(options);
    let rewritten = AddonRewriter::new(options, resolvers)
        .rewrite(input.resource_path, input.source, input.map)
        .await?;
    let map = rewritten.map_json().map_err(LoaderError::MapOutput)?;
    Ok(LoaderOutput {
        code: rewritten.code,
        map,
    })
}

use serde::Deserialize;

use crate::idiom::Idiom;

/// Loader options as passed by the host, e.g. `{"nodeGypBuild": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderOptions {
    /// Rewrite `require('bindings')(...)` calls.
    pub bindings: bool,
    /// Rewrite `require('node-gyp-build')(...)` calls.
    pub node_gyp_build: bool,
    /// Maximum number of AST nodes one argument evaluation may visit.
    pub eval_budget: usize,
    /// Embed the module text as `sourcesContent` when there is no input map.
    pub sources_content: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            bindings: true,
            node_gyp_build: true,
            eval_budget: 10_000,
            sources_content: true,
        }
    }
}

impl LoaderOptions {
    /// Parses host options. Malformed options are reported and replaced by
    /// the defaults so a bad config never blocks the build.
    pub fn from_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };
        serde_json::from_str(raw).unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring malformed loader options");
            Self::default()
        })
    }

    /// Enabled idioms in processing order.
    pub fn idioms(&self) -> impl Iterator<Item = Idiom> + '_ {
        Idiom::ALL.into_iter().filter(move |idiom| match idiom {
            Idiom::Bindings => self.bindings,
            Idiom::NodeGypBuild => self.node_gyp_build,
        })
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::resolve::{BindingsOptions, Resolvers};

// -----------------------------------------------------------------------------
// Call heads
// -----------------------------------------------------------------------------

fn call_head(name: &str) -> Regex {
    let name = regex::escape(name);
    // Only the opening paren of the argument list is matched here; the scanner
    // balances the rest.
    Regex::new(&format!(
        r#"\brequire\(\s*(?:'{name}'|"{name}")\s*\)\s*\("#
    ))
    .expect("call head pattern is a valid regex")
}

static BINDINGS_HEAD: Lazy<Regex> = Lazy::new(|| call_head("bindings"));
static NODE_GYP_BUILD_HEAD: Lazy<Regex> = Lazy::new(|| call_head("node-gyp-build"));

// -----------------------------------------------------------------------------
// Idiom descriptor
// -----------------------------------------------------------------------------

/// A native-addon loading idiom recognised by the loader.
///
/// Everything that differs between the two idioms lives here, so the scan,
/// evaluate and rewrite steps are written once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Idiom {
    /// `require('bindings')(...)`
    Bindings,
    /// `require('node-gyp-build')(...)`
    NodeGypBuild,
}

impl Idiom {
    /// Processing order within one module.
    pub const ALL: [Idiom; 2] = [Idiom::Bindings, Idiom::NodeGypBuild];

    /// The specifier passed to `require` in source code.
    pub fn name(self) -> &'static str {
        match self {
            Idiom::Bindings => "bindings",
            Idiom::NodeGypBuild => "node-gyp-build",
        }
    }

    /// The package the host has to resolve before the idiom's resolver can run.
    pub fn helper_package(self) -> &'static str {
        // Each idiom is its own helper: the package named in `require(...)`.
        self.name()
    }

    pub(crate) fn call_head(self) -> &'static Regex {
        match self {
            Idiom::Bindings => &BINDINGS_HEAD,
            Idiom::NodeGypBuild => &NODE_GYP_BUILD_HEAD,
        }
    }

    /// Turns an evaluated call argument into the absolute path of the addon
    /// the call would load.
    pub fn locate(
        self,
        resolvers: &Resolvers<'_>,
        helper: &Path,
        module_file: &Path,
        value: Value,
    ) -> anyhow::Result<PathBuf> {
        match self {
            Idiom::Bindings => {
                let module_root = resolvers.bindings.module_root(helper, module_file)?;
                let options = BindingsOptions {
                    bindings: value,
                    path: true,
                    module_root,
                };
                resolvers.bindings.locate(helper, &options)
            }
            Idiom::NodeGypBuild => resolvers.gyp_build.path(helper, &value),
        }
    }
}

impl fmt::Display for Idiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_accept_both_quote_styles() {
        let head = Idiom::Bindings.call_head();
        assert!(head.is_match("require('bindings')('x')"));
        assert!(head.is_match(r#"require("bindings") ('x')"#));
        assert!(head.is_match("require( 'bindings' )\n('x')"));
        assert!(!head.is_match("require('bindings')"));
        assert!(!head.is_match("myrequire('bindings')('x')"));
        assert!(!head.is_match("require('bindings-extra')('x')"));
    }

    #[test]
    fn gyp_head_escapes_dashes() {
        let head = Idiom::NodeGypBuild.call_head();
        assert!(head.is_match("require('node-gyp-build')(__dirname)"));
        assert!(!head.is_match("require('node_gyp_build')(__dirname)"));
    }

    #[test]
    fn serializes_as_package_names() {
        assert_eq!(
            serde_json::to_string(&Idiom::NodeGypBuild).unwrap(),
            r#""node-gyp-build""#
        );
        assert_eq!(Idiom::Bindings.to_string(), "bindings");
        assert_eq!(Idiom::Bindings.helper_package(), "bindings");
    }
}

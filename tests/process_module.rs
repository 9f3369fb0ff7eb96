use async_trait::async_trait;
use native_addon_loader::{
    process_module, BindingsOptions, BindingsResolver, LoaderError, LoaderInput, ModuleResolver,
    Resolvers,
};
use serde_json::Value;
use sourcemap::{SourceMap, SourceMapBuilder};
use std::path::{Path, PathBuf};

struct NodeModules;

#[async_trait]
impl ModuleResolver for NodeModules {
    async fn resolve(&self, _context: &Path, request: &str) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from("/project/node_modules")
            .join(request)
            .join("index.js"))
    }
}

struct FixedAddon(&'static str);

impl BindingsResolver for FixedAddon {
    fn module_root(&self, _helper: &Path, _file: &Path) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from("/project"))
    }

    fn locate(&self, _helper: &Path, _options: &BindingsOptions) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from(self.0))
    }
}

fn no_prebuilds(_helper: &Path, value: &Value) -> anyhow::Result<PathBuf> {
    anyhow::bail!("No native build was found in {value}")
}

fn resolvers(addon: &FixedAddon) -> Resolvers<'_> {
    Resolvers {
        modules: &NodeModules,
        bindings: addon,
        gyp_build: &no_prebuilds,
    }
}

fn input<'a>(source: &'a str, map: Option<&'a str>) -> LoaderInput<'a> {
    LoaderInput {
        resource_path: Path::new("/project/src/index.js"),
        source,
        map,
    }
}

#[tokio::test]
async fn bindings_call_becomes_relative_require() {
    let addon = FixedAddon("/project/build/Release/addon.node");
    let out = process_module(
        input("const b = require('bindings')({ bindings: 'addon' });", None),
        None,
        resolvers(&addon),
    )
    .await
    .unwrap();

    assert_eq!(out.code, "const b = require('./../build/Release/addon.node');");

    let map = SourceMap::from_slice(out.map.as_bytes()).unwrap();
    assert_eq!(map.get_source(0), Some("/project/src/index.js"));
    let token = map.lookup_token(0, 6).unwrap();
    assert_eq!((token.get_src_line(), token.get_src_col()), (0, 0));
    assert!(!map.lookup_token(0, 10).unwrap().has_source());
}

#[tokio::test]
async fn surrounding_lines_keep_their_mappings() {
    let addon = FixedAddon("/project/build/Release/addon.node");
    let src = "'use strict';\nconst b = require('bindings')(\n  'addon'\n);\nmodule.exports = b;\n";
    let out = process_module(input(src, None), None, resolvers(&addon))
        .await
        .unwrap();

    assert_eq!(
        out.code,
        "'use strict';\nconst b = require('./../build/Release/addon.node');\nmodule.exports = b;\n"
    );

    let map = SourceMap::from_slice(out.map.as_bytes()).unwrap();
    let first = map.lookup_token(0, 0).unwrap();
    assert_eq!((first.get_src_line(), first.get_src_col()), (0, 0));
    // the call spanned three lines, so the export moves up by two
    let export = map.lookup_token(2, 0).unwrap();
    assert_eq!((export.get_src_line(), export.get_src_col()), (4, 0));
}

#[tokio::test]
async fn module_without_idioms_is_returned_unchanged() {
    let addon = FixedAddon("/unused.node");
    let src = "const addon = require('./build/Release/addon.node');\n";
    let out = process_module(input(src, None), Some(r#"{"evalBudget": 100}"#), resolvers(&addon))
        .await
        .unwrap();
    assert_eq!(out.code, src);
}

#[tokio::test]
async fn resolver_errors_fail_the_module() {
    let addon = FixedAddon("/unused.node");
    let err = process_module(
        input("module.exports = require('node-gyp-build')(__dirname);", None),
        None,
        resolvers(&addon),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LoaderError::Resolution { .. }));
    assert!(err.to_string().contains("/project/src/index.js"));
}

#[tokio::test]
async fn disabled_idiom_survives_failing_resolver() {
    let addon = FixedAddon("/unused.node");
    let src = "module.exports = require('node-gyp-build')(__dirname);";
    let out = process_module(
        input(src, None),
        Some(r#"{"nodeGypBuild": false}"#),
        resolvers(&addon),
    )
    .await
    .unwrap();
    assert_eq!(out.code, src);
}

#[tokio::test]
async fn input_map_is_carried_through() {
    // index.js was itself compiled from index.ts
    let src = "'use strict';\nconst b = require('bindings')('addon');\nmodule.exports = b;\n";
    let mut builder = SourceMapBuilder::new(Some("index.js"));
    let ts = builder.add_source("/project/src/index.ts");
    builder.set_source_contents(ts, Some("import b from 'bindings';"));
    let export_name = builder.add_name("exports");
    builder.add_raw(0, 0, 0, 0, Some(ts), None, false);
    builder.add_raw(1, 0, 2, 4, Some(ts), None, false);
    builder.add_raw(2, 0, 7, 0, Some(ts), Some(export_name), false);
    let mut input_map = Vec::new();
    builder.into_sourcemap().to_writer(&mut input_map).unwrap();
    let input_map = String::from_utf8(input_map).unwrap();

    let addon = FixedAddon("/project/build/Release/addon.node");
    let out = process_module(input(src, Some(input_map.as_str())), None, resolvers(&addon))
        .await
        .unwrap();

    assert_eq!(
        out.code,
        "'use strict';\nconst b = require('./../build/Release/addon.node');\nmodule.exports = b;\n"
    );
    let map = SourceMap::from_slice(out.map.as_bytes()).unwrap();
    assert_eq!(map.get_source(0), Some("/project/src/index.ts"));
    assert_eq!(map.get_source_contents(0), Some("import b from 'bindings';"));

    let decl = map.lookup_token(1, 0).unwrap();
    assert_eq!((decl.get_src_line(), decl.get_src_col()), (2, 4));
    assert!(!map.lookup_token(1, 10).unwrap().has_source());
    let export = map.lookup_token(2, 0).unwrap();
    assert_eq!((export.get_src_line(), export.get_src_col()), (7, 0));
    assert_eq!(export.get_name(), Some("exports"));
}

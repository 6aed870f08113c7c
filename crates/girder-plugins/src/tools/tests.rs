//! Unit tests for tool discovery.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use girder_graph::{
    LibraryLinking, ModuleKind, Product, ProductInfo, Target, TargetDependency, TargetInfo,
};

use super::*;

const HOST_TRIPLE: &str = "x86_64-unknown-linux-gnu";

fn write_manifest(dir: &Path, body: &str) {
    fs::write(dir.join(ARTIFACT_MANIFEST_FILENAME), body).expect("write manifest");
}

#[test]
fn vended_tool_matches_the_host_triple() {
    let tmp = TempDir::new().expect("tempdir");
    write_manifest(
        tmp.path(),
        &format!(
            r#"{{"artifacts":{{"fmt":{{"variants":[
                {{"path":"bin/other/fmt","supportedTriples":["aarch64-apple-darwin"]}},
                {{"path":"bin/linux/fmt","supportedTriples":["{HOST_TRIPLE}"]}}
            ]}}}}}}"#
        ),
    );

    let tools = vended_tools(tmp.path(), HOST_TRIPLE).expect("tools");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "fmt");
    assert_eq!(tools[0].path, tmp.path().join("bin/linux/fmt"));
}

#[test]
fn universal_variant_is_accepted() {
    let tmp = TempDir::new().expect("tempdir");
    write_manifest(
        tmp.path(),
        r#"{"artifacts":{"lint":{"variants":[{"path":"bin/lint"}]}}}"#,
    );

    let tools = vended_tools(tmp.path(), HOST_TRIPLE).expect("tools");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].path, tmp.path().join("bin/lint"));
}

#[test]
fn incompatible_artifacts_are_skipped() {
    let tmp = TempDir::new().expect("tempdir");
    write_manifest(
        tmp.path(),
        r#"{"artifacts":{
            "fmt":{"variants":[{"path":"bin/fmt","supportedTriples":["wasm32-wasi"]}]},
            "lint":{"variants":[{"path":"bin/lint"}]}
        }}"#,
    );

    let tools = vended_tools(tmp.path(), HOST_TRIPLE).expect("tools");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["lint"]);
}

#[test]
fn missing_manifest_is_unreadable() {
    let tmp = TempDir::new().expect("tempdir");
    let result = vended_tools(tmp.path(), HOST_TRIPLE);
    assert!(matches!(
        result,
        Err(ToolResolutionError::ManifestUnreadable { .. })
    ));
}

#[rstest]
#[case::not_json("not json at all")]
#[case::wrong_shape(r#"{"artifacts":[1,2,3]}"#)]
fn malformed_manifest_is_rejected(#[case] body: &str) {
    let tmp = TempDir::new().expect("tempdir");
    write_manifest(tmp.path(), body);
    let result = vended_tools(tmp.path(), HOST_TRIPLE);
    assert!(matches!(
        result,
        Err(ToolResolutionError::ManifestMalformed { .. })
    ));
}

#[test]
fn built_tools_resolve_under_the_built_products_dir() {
    let protogen = Arc::new(Target::new(
        "protogen",
        PathBuf::from("/ws/pkg/Sources/protogen"),
        TargetInfo::source_module(ModuleKind::Executable, "protogen"),
    ));
    let library = Arc::new(Target::new(
        "Core",
        PathBuf::from("/ws/pkg/Sources/Core"),
        TargetInfo::source_module(ModuleKind::Library, "Core"),
    ));
    let exe_product = Arc::new(Product::new(
        "docgen",
        vec![Arc::clone(&protogen)],
        ProductInfo::Executable,
    ));
    let lib_product = Arc::new(Product::new(
        "corelib",
        vec![Arc::clone(&library)],
        ProductInfo::Library(LibraryLinking::Automatic),
    ));
    let plugin = Target::new(
        "GenPlugin",
        PathBuf::from("/ws/pkg/Plugins/GenPlugin"),
        TargetInfo::Plugin {
            capability: girder_graph::PluginCapabilityKind::BuildTool,
            sources: vec![],
        },
    )
    .with_dependencies(vec![
        TargetDependency::Target(Arc::clone(&protogen)),
        TargetDependency::Target(Arc::clone(&library)),
        TargetDependency::Product(exe_product),
        TargetDependency::Product(lib_product),
    ]);

    let tools =
        accessible_tools(&plugin, Path::new("/out/build/debug"), HOST_TRIPLE).expect("tools");
    let resolved: Vec<(&str, &Path)> = tools
        .iter()
        .map(|t| (t.name.as_str(), t.path.as_path()))
        .collect();
    // Library edges contribute nothing; executable target and product do.
    assert_eq!(
        resolved,
        vec![
            ("protogen", Path::new("/out/build/debug/protogen")),
            ("docgen", Path::new("/out/build/debug/docgen")),
        ]
    );
}

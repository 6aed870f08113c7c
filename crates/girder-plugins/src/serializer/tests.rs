//! Unit tests for the graph serializer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use girder_graph::{
    LibraryLinking, ModuleKind, Package, PackageIdentity, PluginCapabilityKind, Product,
    ProductInfo, Target, TargetDependency, TargetInfo,
};
use girder_wire::{PluginAction, PluginInput, WireDependency, WireFileKind, WireProductInfo};

use super::*;

struct Fixture {
    root: Arc<Package>,
    app: Arc<Target>,
    core: Arc<Target>,
    plugin: Arc<Target>,
}

/// Two source targets sharing the `/ws/pkg/Sources` ancestor, a plugin
/// target, an executable product, and a dependency package vending a
/// library product.
fn fixture() -> Fixture {
    let dep_core = Arc::new(Target::new(
        "DepCore",
        PathBuf::from("/ws/dep/Sources/DepCore"),
        TargetInfo::source_module(ModuleKind::Library, "DepCore")
            .with_sources(vec![PathBuf::from("/ws/dep/Sources/DepCore/lib.rs")]),
    ));
    let dep_product = Arc::new(Product::new(
        "depcore",
        vec![Arc::clone(&dep_core)],
        ProductInfo::Library(LibraryLinking::Automatic),
    ));
    let dep_package = Arc::new(
        Package::new(PackageIdentity::new("dep"), "dep", PathBuf::from("/ws/dep"))
            .with_products(vec![Arc::clone(&dep_product)])
            .with_targets(vec![Arc::clone(&dep_core)]),
    );

    let core = Arc::new(Target::new(
        "Core",
        PathBuf::from("/ws/pkg/Sources/Core"),
        TargetInfo::source_module(ModuleKind::Library, "Core")
            .with_sources(vec![
                PathBuf::from("/ws/pkg/Sources/Core/a.rs"),
                PathBuf::from("/ws/pkg/Sources/Core/b.rs"),
            ])
            .with_resources(vec![PathBuf::from("/ws/pkg/Sources/Core/data.json")]),
    ));
    let plugin = Arc::new(Target::new(
        "GenPlugin",
        PathBuf::from("/ws/pkg/Plugins/GenPlugin"),
        TargetInfo::Plugin {
            capability: PluginCapabilityKind::BuildTool,
            sources: vec![PathBuf::from("/ws/pkg/Plugins/GenPlugin/main.rs")],
        },
    ));
    let app = Arc::new(
        Target::new(
            "App",
            PathBuf::from("/ws/pkg/Sources/App"),
            TargetInfo::source_module(ModuleKind::Executable, "App")
                .with_sources(vec![PathBuf::from("/ws/pkg/Sources/App/main.rs")]),
        )
        .with_dependencies(vec![
            TargetDependency::Target(Arc::clone(&core)),
            TargetDependency::Target(Arc::clone(&plugin)),
            TargetDependency::Product(Arc::clone(&dep_product)),
        ]),
    );

    let app_product = Arc::new(Product::new(
        "app",
        vec![Arc::clone(&app), Arc::clone(&core)],
        ProductInfo::Executable,
    ));
    let plugin_product = Arc::new(Product::new(
        "gen",
        vec![Arc::clone(&plugin)],
        ProductInfo::Plugin,
    ));

    let root = Arc::new(
        Package::new(PackageIdentity::new("pkg"), "pkg", PathBuf::from("/ws/pkg"))
            .with_dependencies(vec![dep_package])
            .with_products(vec![app_product, plugin_product])
            .with_targets(vec![Arc::clone(&app), Arc::clone(&core), Arc::clone(&plugin)]),
    );

    Fixture {
        root,
        app,
        core,
        plugin,
    }
}

fn serialize_fixture(fixture: &Fixture) -> PluginInput {
    serialize_input(
        &fixture.root,
        Path::new("/out/pkg/App/GenPlugin"),
        Path::new("/out/build/debug"),
        &BTreeMap::new(),
        &ActionRequest::CreateBuildToolCommands {
            target: Arc::clone(&fixture.app),
        },
    )
    .expect("serialize")
}

/// Resolves a wire path ID back to an absolute path string.
fn resolve_path(input: &PluginInput, id: girder_wire::PathId) -> String {
    let record = &input.paths[id.index()];
    match record.base {
        Some(base) => format!("{}/{}", resolve_path(input, base), record.subpath),
        None => format!("/{}", record.subpath),
    }
}

#[test]
fn serialization_is_deterministic() {
    let fixture = fixture();
    let first = serde_json::to_vec(&serialize_fixture(&fixture)).expect("serialize");
    let second = serde_json::to_vec(&serialize_fixture(&fixture)).expect("serialize");
    assert_eq!(first, second);
}

#[test]
fn shared_path_prefixes_share_records() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);

    let sources_records = input
        .paths
        .iter()
        .filter(|p| p.subpath == "Sources")
        .count();
    // `/ws/pkg/Sources` and `/ws/dep/Sources` are distinct directories.
    assert_eq!(sources_records, 2);

    // Every distinct absolute path has exactly one record.
    let mut resolved: Vec<String> = (0..input.paths.len())
        .map(|i| {
            resolve_path(
                &input,
                girder_wire::PathId::new(u32::try_from(i).expect("fits")),
            )
        })
        .collect();
    let total = resolved.len();
    resolved.sort();
    resolved.dedup();
    assert_eq!(resolved.len(), total, "duplicate path records");
}

#[test]
fn sibling_targets_resolve_to_the_same_ancestor() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);

    let app = input.targets.iter().find(|t| t.name == "App").expect("App");
    let core = input
        .targets
        .iter()
        .find(|t| t.name == "Core")
        .expect("Core");

    let app_parent = input.paths[app.directory.index()].base.expect("parent");
    let core_parent = input.paths[core.directory.index()].base.expect("parent");
    assert_eq!(app_parent, core_parent);
    assert_eq!(resolve_path(&input, app_parent), "/ws/pkg/Sources");
}

#[test]
fn plugin_targets_are_not_serialized_and_edges_dropped() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);

    assert!(input.targets.iter().all(|t| t.name != "GenPlugin"));

    let app = input.targets.iter().find(|t| t.name == "App").expect("App");
    // Core edge and the dep product edge survive; the plugin edge is gone.
    assert_eq!(app.dependencies.len(), 2);
    assert!(matches!(app.dependencies[0], WireDependency::Target { .. }));
    assert!(matches!(app.dependencies[1], WireDependency::Product { .. }));

    // The plugin product is gone too.
    assert!(input.products.iter().all(|p| p.name != "gen"));
}

#[test]
fn shared_targets_serialize_once() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);
    let core_records = input.targets.iter().filter(|t| t.name == "Core").count();
    assert_eq!(core_records, 1);
}

#[test]
fn executable_product_names_its_main_target() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);
    let product = input.products.iter().find(|p| p.name == "app").expect("app");
    let WireProductInfo::Executable { main_target } = product.info else {
        panic!("expected executable product");
    };
    assert_eq!(input.targets[main_target.index()].name, "App");
}

#[test]
fn executable_product_without_executable_target_fails() {
    let core = Arc::new(Target::new(
        "Core",
        PathBuf::from("/ws/pkg/Sources/Core"),
        TargetInfo::source_module(ModuleKind::Library, "Core"),
    ));
    let product = Arc::new(Product::new(
        "app",
        vec![Arc::clone(&core)],
        ProductInfo::Executable,
    ));
    let root = Arc::new(
        Package::new(PackageIdentity::new("pkg"), "pkg", PathBuf::from("/ws/pkg"))
            .with_products(vec![product])
            .with_targets(vec![Arc::clone(&core)]),
    );

    let result = serialize_input(
        &root,
        Path::new("/out/w"),
        Path::new("/out/b"),
        &BTreeMap::new(),
        &ActionRequest::CreateBuildToolCommands {
            target: Arc::clone(&core),
        },
    );
    assert!(matches!(
        result,
        Err(SerializationError::BrokenExecutableProduct { count: 0, .. })
    ));
}

#[test]
fn action_on_plugin_target_is_unrepresentable() {
    let fixture = fixture();
    let result = serialize_input(
        &fixture.root,
        Path::new("/out/w"),
        Path::new("/out/b"),
        &BTreeMap::new(),
        &ActionRequest::CreateBuildToolCommands {
            target: Arc::clone(&fixture.plugin),
        },
    );
    assert!(matches!(
        result,
        Err(SerializationError::UnrepresentableTarget { .. })
    ));
}

#[test]
fn action_reuses_the_memoized_target_id() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);
    let PluginAction::CreateBuildToolCommands { target } = input.plugin_action else {
        panic!("expected build-tool action");
    };
    assert_eq!(input.targets[target.index()].name, "App");
    // Translating the action did not append a duplicate record.
    assert_eq!(
        input.targets.iter().filter(|t| t.name == "App").count(),
        1
    );
}

#[test]
fn files_concatenate_sources_then_resources() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);
    let core = input
        .targets
        .iter()
        .find(|t| t.name == "Core")
        .expect("Core");
    let girder_wire::WireTargetInfo::SourceModule { files, .. } = &core.info else {
        panic!("expected source module");
    };
    let kinds: Vec<WireFileKind> = files.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            WireFileKind::Source,
            WireFileKind::Source,
            WireFileKind::Resource
        ]
    );
    assert_eq!(files[0].name, "a.rs");
    assert_eq!(files[2].name, "data.json");
}

#[test]
fn tool_paths_are_serialized_into_the_map() {
    let fixture = fixture();
    let mut tools = BTreeMap::new();
    tools.insert(
        "protogen".to_owned(),
        PathBuf::from("/out/build/debug/protogen"),
    );
    let input = serialize_input(
        &fixture.root,
        Path::new("/out/w"),
        Path::new("/out/build/debug"),
        &tools,
        &ActionRequest::CreateBuildToolCommands {
            target: Arc::clone(&fixture.app),
        },
    )
    .expect("serialize");

    let id = input.tool_names_to_path_ids["protogen"];
    assert_eq!(resolve_path(&input, id), "/out/build/debug/protogen");
    // The tool path shares the built-products-dir prefix records.
    assert_eq!(
        input.paths[id.index()].base,
        Some(input.built_products_dir_id)
    );
}

#[test]
fn runtime_reconstructs_the_source_projection() {
    let fixture = fixture();
    let input = serialize_fixture(&fixture);

    let view = girder_runtime::InputView::new(input).expect("valid input");
    assert_eq!(view.work_dir(), Path::new("/out/pkg/App/GenPlugin"));
    assert_eq!(view.built_products_dir(), Path::new("/out/build/debug"));

    let girder_wire::PluginAction::CreateBuildToolCommands { target } = *view.action() else {
        panic!("expected build-tool action");
    };
    let target_view = view.target(target).expect("target in range");
    assert_eq!(target_view.name(), "App");
    assert_eq!(target_view.directory(), Path::new("/ws/pkg/Sources/App"));
    assert_eq!(
        target_view.files(),
        vec![(
            PathBuf::from("/ws/pkg/Sources/App/main.rs"),
            WireFileKind::Source
        )]
    );
    assert_eq!(target_view.dependencies().len(), 2);

    let root = view.root_package();
    assert_eq!(root.name(), "pkg");
    assert_eq!(root.directory(), Path::new("/ws/pkg"));
    // App, Core; the plugin target has no wire form.
    assert_eq!(root.target_ids().len(), 2);

    // The Core projection matches the in-memory target.
    let core_id = root
        .target_ids()
        .iter()
        .copied()
        .find(|id| view.target(*id).is_some_and(|t| t.name() == "Core"))
        .expect("Core id");
    let core_view = view.target(core_id).expect("Core");
    assert_eq!(core_view.directory(), fixture.core.directory());
    assert_eq!(core_view.files().len(), 3);
}

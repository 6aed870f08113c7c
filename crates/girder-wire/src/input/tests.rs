//! Unit tests for the flattened graph records.

use std::collections::BTreeMap;

use rstest::rstest;

use super::*;

fn minimal_input() -> PluginInput {
    PluginInput {
        paths: vec![
            WirePath {
                base: None,
                subpath: "pkg".into(),
            },
            WirePath {
                base: Some(PathId::new(0)),
                subpath: "Sources".into(),
            },
        ],
        targets: vec![WireTarget {
            name: "Core".into(),
            directory: PathId::new(1),
            dependencies: vec![],
            info: WireTargetInfo::SourceModule {
                module_name: "Core".into(),
                public_headers_dir: None,
                files: vec![WireFile {
                    base: PathId::new(1),
                    name: "lib.rs".into(),
                    kind: WireFileKind::Source,
                }],
            },
        }],
        products: vec![],
        packages: vec![WirePackage {
            name: "pkg".into(),
            directory: PathId::new(0),
            dependencies: vec![],
            products: vec![],
            targets: vec![TargetId::new(0)],
        }],
        root_package_id: PackageId::new(0),
        plugin_work_dir_id: PathId::new(0),
        built_products_dir_id: PathId::new(0),
        tool_names_to_path_ids: BTreeMap::new(),
        plugin_action: PluginAction::CreateBuildToolCommands {
            target: TargetId::new(0),
        },
    }
}

#[test]
fn input_round_trips() {
    let input = minimal_input();
    let json = serde_json::to_string(&input).expect("serialize");
    let back: PluginInput = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, input);
}

#[test]
fn top_level_keys_match_the_protocol() {
    let json = serde_json::to_value(minimal_input()).expect("serialize");
    let object = json.as_object().expect("object");
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "paths",
            "targets",
            "products",
            "packages",
            "rootPackageId",
            "pluginWorkDirId",
            "builtProductsDirId",
            "toolNamesToPathIds",
            "pluginAction",
        ]
    );
}

#[test]
fn ids_serialize_as_bare_integers() {
    let json = serde_json::to_string(&TargetId::new(42)).expect("serialize");
    assert_eq!(json, "42");
    let back: TargetId = serde_json::from_str("42").expect("deserialize");
    assert_eq!(back.index(), 42);
}

#[test]
fn root_path_omits_base() {
    let root_child = WirePath {
        base: None,
        subpath: "usr".into(),
    };
    let json = serde_json::to_string(&root_child).expect("serialize");
    assert_eq!(json, r#"{"subpath":"usr"}"#);
}

#[rstest]
#[case::source_module(
    WireTargetInfo::SourceModule {
        module_name: "Core".into(),
        public_headers_dir: None,
        files: vec![],
    },
    "sourceModule"
)]
#[case::binary(
    WireTargetInfo::BinaryLibrary { path: PathId::new(0) },
    "binaryLibrary"
)]
#[case::system(
    WireTargetInfo::SystemLibrary { public_headers_dir: PathId::new(0) },
    "systemLibrary"
)]
fn target_info_serializes_with_type_tag(
    #[case] info: WireTargetInfo,
    #[case] expected_type: &str,
) {
    let json = serde_json::to_value(&info).expect("serialize");
    assert_eq!(
        json.get("type").and_then(serde_json::Value::as_str),
        Some(expected_type)
    );
}

#[rstest]
#[case::executable(
    WireProductInfo::Executable { main_target: TargetId::new(1) },
    r#"{"type":"executable","mainTarget":1}"#
)]
#[case::static_library(
    WireProductInfo::Library { kind: LibraryKind::Static },
    r#"{"type":"library","kind":"static"}"#
)]
fn product_info_wire_shape(#[case] info: WireProductInfo, #[case] expected: &str) {
    assert_eq!(serde_json::to_string(&info).expect("serialize"), expected);
}

#[test]
fn dependency_edges_are_discriminated() {
    let target = WireDependency::Target {
        target_id: TargetId::new(2),
    };
    let product = WireDependency::Product {
        product_id: ProductId::new(5),
    };
    assert_eq!(
        serde_json::to_string(&target).expect("serialize"),
        r#"{"type":"target","targetId":2}"#
    );
    assert_eq!(
        serde_json::to_string(&product).expect("serialize"),
        r#"{"type":"product","productId":5}"#
    );
}

#[test]
fn unknown_action_discriminator_is_rejected() {
    let result: Result<PluginAction, _> =
        serde_json::from_str(r#"{"type":"reformatEverything","target":0}"#);
    assert!(result.is_err());
}

#[test]
fn user_command_action_round_trips() {
    let action = PluginAction::PerformUserCommand {
        targets: vec![TargetId::new(0), TargetId::new(3)],
        arguments: vec!["--verbose".into()],
    };
    let json = serde_json::to_string(&action).expect("serialize");
    let back: PluginAction = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, action);
}

#[test]
fn serialization_is_deterministic() {
    let mut tools = BTreeMap::new();
    tools.insert("zeta".to_owned(), PathId::new(1));
    tools.insert("alpha".to_owned(), PathId::new(0));
    let mut input = minimal_input();
    input.tool_names_to_path_ids = tools;

    let first = serde_json::to_vec(&input).expect("serialize");
    let second = serde_json::to_vec(&input).expect("serialize");
    assert_eq!(first, second);

    // Map keys come out sorted regardless of insertion order.
    let text = String::from_utf8(first).expect("utf8");
    let alpha = text.find("alpha").expect("alpha present");
    let zeta = text.find("zeta").expect("zeta present");
    assert!(alpha < zeta);
}

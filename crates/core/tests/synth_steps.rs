mod common;

use common::GoTree;
use gobuild_core::config::ResolvedOptions;
use gobuild_core::graph::{Artifact, OperationGraph};
use gobuild_core::package::{Classifier, Package};
use gobuild_core::source::SourceTree;
use gobuild_core::synth::{
    CompileRecipe, DirectDep, DirectDeps, InconsistentGraphError, Synthesizer, TransitiveDeps,
};

fn synthesizer(options: &ResolvedOptions) -> Synthesizer {
    Synthesizer::new(
        options.toolchain.clone(),
        options.platform.clone(),
        SourceTree::new(options.source.clone(), options.mount_path.clone()),
    )
}

fn mixed_package(tree: &GoTree, options: &ResolvedOptions) -> Package {
    tree.write("mixed/mixed.go", "package mixed\n\n// #include \"a.h\"\nimport \"C\"\n")
        .write("mixed/extra.go", "package mixed\n\n/*\n#include \"a.h\"\n*/\nimport \"C\"\n")
        .write("mixed/a.c", "int a(void) { return 1; }\n")
        .write("mixed/b.c", "int b(void) { return 2; }\n")
        .write("mixed/a.h", "int a(void);\n")
        .write("mixed/one_amd64.s", "TEXT ·one(SB),$0\n\tRET\n")
        .write("mixed/two_amd64.s", "TEXT ·two(SB),$0\n\tRET\n");
    tree.classifier().classify(&tree.src("mixed"), &options.platform).unwrap()
}

#[test]
fn recipe_follows_file_classification() {
    let mut pkg = Package::new("/go/src/x", "x", "x");
    pkg.go_files.push("x.go".to_string());
    assert_eq!(CompileRecipe::for_package(&pkg), CompileRecipe::Go);

    pkg.s_files.push("x_amd64.s".to_string());
    assert_eq!(CompileRecipe::for_package(&pkg), CompileRecipe::Assembly);

    pkg.cgo_files.push("c.go".to_string());
    let recipe = CompileRecipe::for_package(&pkg);
    assert_eq!(recipe, CompileRecipe::ForeignFunctionsAndAssembly);
    assert!(recipe.assembly() && recipe.foreign_functions());

    pkg.s_files.clear();
    assert_eq!(CompileRecipe::for_package(&pkg), CompileRecipe::ForeignFunctions);
}

#[test]
fn archive_members_do_not_depend_on_file_order() {
    let tree = GoTree::new();
    let options = tree.cgo_options("mixed");
    let forward = mixed_package(&tree, &options);
    assert_eq!(forward.cgo_files.len(), 2);
    assert_eq!(forward.c_files.len(), 2);
    assert_eq!(forward.s_files.len(), 2);

    let mut reversed = forward.clone();
    reversed.cgo_files.reverse();
    reversed.c_files.reverse();
    reversed.s_files.reverse();
    reversed.go_files.reverse();

    let empty_direct = DirectDeps::new();
    let empty_transitive = TransitiveDeps::new();

    let mut graph_a = OperationGraph::new();
    let a = synthesizer(&options)
        .synthesize(&mut graph_a, &forward, &empty_direct, &empty_transitive)
        .unwrap();
    let mut graph_b = OperationGraph::new();
    let b = synthesizer(&options)
        .synthesize(&mut graph_b, &reversed, &empty_direct, &empty_transitive)
        .unwrap();

    assert_eq!(a.members, b.members);
    assert_eq!(a.members.len(), 3);
    assert_eq!(graph_a.by_tool("pack").count(), 2);
    assert_eq!(graph_b.by_tool("pack").count(), 2);
    // Two glue units, two translated cgo files, two native files.
    let native = graph_a.by_tool("gcc").filter(|op| op.args.iter().any(|a| a == "-c"));
    assert_eq!(native.count(), 6);
}

#[test]
fn missing_direct_dependency_is_a_contract_violation() {
    let tree = GoTree::new();
    tree.write("user/user.go", "package user\n\nimport \"example.com/dep\"\n");
    let options = tree.options("user");
    let pkg = tree.classifier().classify(&tree.src("user"), &options.platform).unwrap();

    let err = synthesizer(&options)
        .synthesize(&mut OperationGraph::new(), &pkg, &DirectDeps::new(), &TransitiveDeps::new())
        .unwrap_err();
    assert!(matches!(err, InconsistentGraphError::UndeclaredDependency { .. }));
}

#[test]
fn dependency_absent_from_transitive_set_is_a_contract_violation() {
    let tree = GoTree::new();
    tree.write("user/user.go", "package user\n\nimport \"example.com/dep\"\n");
    let options = tree.options("user");
    let pkg = tree.classifier().classify(&tree.src("user"), &options.platform).unwrap();

    let mut direct = DirectDeps::new();
    direct.insert(
        "example.com/dep".to_string(),
        DirectDep::archive("example.com/dep", Artifact::source("elsewhere")),
    );
    let err = synthesizer(&options)
        .synthesize(&mut OperationGraph::new(), &pkg, &direct, &TransitiveDeps::new())
        .unwrap_err();
    assert!(matches!(err, InconsistentGraphError::TransitiveMismatch { .. }));

    let mut transitive = TransitiveDeps::new();
    transitive.insert("example.com/dep".to_string(), Artifact::source("elsewhere"));
    let mut unexpected = direct.clone();
    unexpected.insert("example.com/other".to_string(), DirectDep::Toolchain);
    let err = synthesizer(&options)
        .synthesize(&mut OperationGraph::new(), &pkg, &unexpected, &transitive)
        .unwrap_err();
    assert!(matches!(err, InconsistentGraphError::UnexpectedDependency { .. }));
}

#[test]
fn file_deleted_after_classification_is_a_missing_input() {
    let tree = GoTree::new();
    tree.write("gone/gone.go", "package gone\n");
    let options = tree.options("gone");
    let pkg = tree.classifier().classify(&tree.src("gone"), &options.platform).unwrap();
    std::fs::remove_file(tree.src("gone/gone.go")).unwrap();

    let err = synthesizer(&options)
        .synthesize(&mut OperationGraph::new(), &pkg, &DirectDeps::new(), &TransitiveDeps::new())
        .unwrap_err();
    assert!(matches!(err, InconsistentGraphError::MissingInput { .. }));
}

#[test]
fn source_tree_selectors_are_relative_to_the_mount_path() {
    let tree = GoTree::new();
    tree.write("example.com/x/x.go", "package x\n");
    let mut source = SourceTree::new("ctx", tree.gopath());

    let (selector, digest) = source.file(&tree.src("example.com/x/x.go")).unwrap();
    assert_eq!(selector, "src/example.com/x/x.go");
    assert!(digest.as_str().starts_with("sha256:"));
    assert_eq!(source.artifact(), &Artifact::source("ctx"));

    let outside = std::path::Path::new("/definitely/not/mounted.go");
    assert!(matches!(source.selector(outside), Err(InconsistentGraphError::MissingInput { .. })));
}

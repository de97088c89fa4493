mod common;

use common::{linux_amd64, GoTree};
use gobuild_core::config::PlatformConfig;
use gobuild_core::package::constraint::{file_name_matches, Expr, TagSet};
use gobuild_core::package::scan::{cgo_directives, read_header, Constraints};
use gobuild_core::package::{ClassificationError, Classifier};

#[test]
fn file_name_suffixes_select_platform() {
    let tags = TagSet::new(&linux_amd64());
    assert!(file_name_matches("net.go", &tags));
    assert!(file_name_matches("net_linux.go", &tags));
    assert!(file_name_matches("net_amd64.s", &tags));
    assert!(file_name_matches("net_linux_amd64.go", &tags));
    assert!(file_name_matches("linux.go", &tags));
    assert!(file_name_matches("sys_helper.go", &tags));
    assert!(!file_name_matches("net_windows.go", &tags));
    assert!(!file_name_matches("net_arm64.go", &tags));
    assert!(!file_name_matches("net_linux_arm64.go", &tags));
    assert!(!file_name_matches("net_darwin_amd64.go", &tags));
}

#[test]
fn go_build_expressions_evaluate_against_tags() {
    let tags = TagSet::new(&linux_amd64().with_tags(&["integration"]));
    let eval = |s: &str| Expr::parse(s).unwrap().eval(&tags);

    assert!(eval("linux"));
    assert!(eval("linux && amd64"));
    assert!(eval("darwin || linux"));
    assert!(eval("!windows"));
    assert!(eval("(darwin || linux) && !cgo"));
    assert!(eval("unix && gc && go1.9"));
    assert!(eval("integration"));
    assert!(!eval("ignore"));
    assert!(!eval("linux && !amd64"));

    assert!(Expr::parse("linux &&").is_err());
    assert!(Expr::parse("(linux").is_err());
    assert!(Expr::parse("linux & amd64").is_err());
}

#[test]
fn build_expressions_have_bounded_size_and_nesting() {
    let tags = TagSet::new(&linux_amd64());
    let nested = |depth: usize| format!("{}linux{}", "(".repeat(depth), ")".repeat(depth));

    assert!(Expr::parse(&nested(50)).unwrap().eval(&tags));
    assert_eq!(Expr::parse(&nested(150)).unwrap_err(), "build expression too deeply nested");
    let negated = format!("{}linux", "!".repeat(150));
    assert_eq!(Expr::parse(&negated).unwrap_err(), "build expression too deeply nested");

    assert_eq!(Expr::parse(&nested(200_000)).unwrap_err(), "build expression too large");
    let chain = vec!["linux"; 600].join(" && ");
    assert_eq!(Expr::parse(&chain).unwrap_err(), "build expression too large");
}

#[test]
fn deeply_nested_build_line_is_a_parse_error() {
    let tree = GoTree::new();
    let header = format!("//go:build {}linux{}

package x
", "(".repeat(500), ")".repeat(500));
    tree.write("x/x.go", &header).write("x/ok.go", "package x
");

    let err = tree.classifier().classify(&tree.src("x"), &linux_amd64()).unwrap_err();
    assert!(matches!(err, ClassificationError::Parse { .. }));
}

#[test]
fn legacy_build_lines_need_a_following_blank_line() {
    let tags = TagSet::new(&linux_amd64());

    let src = "// +build windows\n\npackage x\n";
    assert!(!Constraints::read(src).satisfied(&tags).unwrap());

    let src = "// +build windows\npackage x\n";
    assert!(Constraints::read(src).satisfied(&tags).unwrap());

    let src = "// +build darwin linux,amd64\n// +build !cgo\n\npackage x\n";
    assert!(Constraints::read(src).satisfied(&tags).unwrap());

    let src = "// +build linux\n// +build arm\n\npackage x\n";
    assert!(!Constraints::read(src).satisfied(&tags).unwrap());
}

#[test]
fn go_build_line_wins_over_legacy_lines() {
    let tags = TagSet::new(&linux_amd64());
    let src = "//go:build linux\n// +build windows\n\npackage x\n";
    assert!(Constraints::read(src).satisfied(&tags).unwrap());
}

#[test]
fn header_reads_package_and_imports() {
    let src = r#"// Package demo does things.
package demo

import "fmt"
import (
	"os"
	str "strings"
	. "math"
	_ "embed"

	"example.com/lib"
)

func main() { fmt.Println(os.Args, str.ToUpper("x"), Pi) }
"#;
    let header = read_header(src).unwrap();
    assert_eq!(header.package, "demo");
    assert_eq!(header.imports, vec!["fmt", "os", "strings", "math", "embed", "example.com/lib"]);
    assert!(!header.uses_cgo);
}

#[test]
fn header_captures_cgo_preamble() {
    let src = r#"package ffi

/*
#cgo CFLAGS: -DPNG_DEBUG=1 -I${SRCDIR}/include
#cgo linux LDFLAGS: -lpng
#cgo windows LDFLAGS: -lpng16
#include <png.h>
*/
import "C"

import "unsafe"
"#;
    let header = read_header(src).unwrap();
    assert!(header.uses_cgo);
    assert_eq!(header.imports, vec!["unsafe"]);

    let flags = cgo_directives(&header.cgo_preamble, &TagSet::new(&linux_amd64())).unwrap();
    assert_eq!(flags.cflags, vec!["-DPNG_DEBUG=1", "-I${SRCDIR}/include"]);
    assert_eq!(flags.ldflags, vec!["-lpng"]);
}

#[test]
fn detached_comment_is_not_a_cgo_preamble() {
    let src = "package ffi\n\n// #cgo LDFLAGS: -lm\n\nimport \"C\"\n";
    let header = read_header(src).unwrap();
    assert!(header.uses_cgo);
    assert!(header.cgo_preamble.is_empty());
}

#[test]
fn header_without_package_clause_is_an_error() {
    assert!(read_header("// nothing here\n").is_err());
    assert!(read_header("package x\nimport (\n\"fmt\"\n").is_err());
}

#[test]
fn classifies_directory_for_target_platform() {
    let tree = GoTree::new();
    tree.write("example.com/lib/lib.go", "package lib\n\nimport \"os\"\n")
        .write("example.com/lib/lib_linux.go", "package lib\n\nimport \"syscall\"\n")
        .write("example.com/lib/lib_windows.go", "package lib\n\nimport \"golang.org/x/sys\"\n")
        .write("example.com/lib/ignored.go", "//go:build ignore\n\npackage main\n")
        .write("example.com/lib/lib_test.go", "package lib\n\nimport \"testing\"\n")
        .write("example.com/lib/_scratch.go", "package scratch\n")
        .write("example.com/lib/sum_amd64.s", "TEXT ·sum(SB),$0\n")
        .write("example.com/lib/sum_arm64.s", "TEXT ·sum(SB),$0\n")
        .write("example.com/lib/README.md", "# lib\n");

    let pkg = tree
        .classifier()
        .classify(&tree.src("example.com/lib"), &linux_amd64())
        .unwrap();

    assert_eq!(pkg.name, "lib");
    assert_eq!(pkg.import_path, "example.com/lib");
    assert_eq!(pkg.go_files, vec!["lib.go", "lib_linux.go"]);
    assert_eq!(pkg.s_files, vec!["sum_amd64.s"]);
    assert_eq!(pkg.imports, vec!["os", "syscall"]);
    assert!(pkg.cgo_files.is_empty());
    assert!(!pkg.is_command());
}

#[test]
fn cgo_files_follow_cgo_enabled() {
    let tree = GoTree::new();
    tree.write("ffi/ffi.go", "package ffi\n\n// #cgo CFLAGS: -DFOO\nimport \"C\"\n")
        .write("ffi/pure.go", "package ffi\n")
        .write("ffi/nocgo.go", "//go:build !cgo\n\npackage ffi\n");
    let dir = tree.src("ffi");

    let enabled = tree.classifier().classify(&dir, &linux_amd64().with_cgo(true)).unwrap();
    assert_eq!(enabled.cgo_files, vec!["ffi.go"]);
    assert_eq!(enabled.go_files, vec!["pure.go"]);
    assert_eq!(enabled.cgo_cflags, vec!["-DFOO"]);
    assert!(enabled.has_foreign_functions());

    let disabled = tree.classifier().classify(&dir, &linux_amd64()).unwrap();
    assert!(disabled.cgo_files.is_empty());
    assert_eq!(disabled.go_files, vec!["nocgo.go", "pure.go"]);
}

#[test]
fn native_files_need_not_be_utf8() {
    let tree = GoTree::new();
    tree.write("ffi/ffi.go", "package ffi\n\nimport \"C\"\n");
    std::fs::write(tree.src("ffi/helper.c"), b"/* caf\xe9 */\nint helper(void) { return 1; }\n")
        .unwrap();
    std::fs::write(tree.src("ffi/helper.h"), b"/* na\xefve */\nint helper(void);\n").unwrap();

    let pkg = tree.classifier().classify(&tree.src("ffi"), &linux_amd64().with_cgo(true)).unwrap();
    assert_eq!(pkg.c_files, vec!["helper.c"]);
    assert_eq!(pkg.h_files, vec!["helper.h"]);
    assert_eq!(pkg.cgo_files, vec!["ffi.go"]);
}

#[test]
fn go_file_with_invalid_utf8_is_a_parse_error() {
    let tree = GoTree::new();
    tree.write("bad/ok.go", "package bad\n");
    std::fs::write(tree.src("bad/bad.go"), b"package bad\n\n// caf\xe9\n").unwrap();

    let err = tree.classifier().classify(&tree.src("bad"), &linux_amd64()).unwrap_err();
    match err {
        ClassificationError::Parse { file, message } => {
            assert!(file.ends_with("bad.go"));
            assert_eq!(message, "invalid UTF-8 encoding");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn native_sources_without_cgo_are_rejected() {
    let tree = GoTree::new();
    tree.write("ffi/ffi.go", "package ffi\n\nimport \"C\"\n")
        .write("ffi/pure.go", "package ffi\n")
        .write("ffi/helper.c", "int helper(void) { return 1; }\n");

    let err = tree.classifier().classify(&tree.src("ffi"), &linux_amd64()).unwrap_err();
    assert!(matches!(err, ClassificationError::NativeWithoutCgo { .. }));
}

#[test]
fn mixed_package_names_are_rejected() {
    let tree = GoTree::new();
    tree.write("mixed/a.go", "package a\n").write("mixed/b.go", "package b\n");

    let err = tree.classifier().classify(&tree.src("mixed"), &linux_amd64()).unwrap_err();
    match err {
        ClassificationError::MultiplePackages { names, .. } => assert_eq!(names, vec!["a", "b"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn directories_without_buildable_go_files_are_rejected() {
    let tree = GoTree::new();
    tree.write("empty/only_windows.go", "package empty\n").write("empty/notes.txt", "hi\n");

    let err = tree.classifier().classify(&tree.src("empty"), &linux_amd64()).unwrap_err();
    assert!(matches!(err, ClassificationError::NoGoFiles { .. }));
}

#[test]
fn directories_outside_the_source_root_are_rejected() {
    let tree = GoTree::new();
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("x.go"), "package x\n").unwrap();

    let err = tree.classifier().classify(outside.path(), &linux_amd64()).unwrap_err();
    assert!(matches!(err, ClassificationError::OutsideRoot { .. }));
}

#[test]
fn missing_directory_is_an_io_error() {
    let tree = GoTree::new();
    let err = tree
        .classifier()
        .classify(&tree.src("does/not/exist"), &PlatformConfig::new("linux", "amd64"))
        .unwrap_err();
    assert!(matches!(err, ClassificationError::Io { .. }));
}

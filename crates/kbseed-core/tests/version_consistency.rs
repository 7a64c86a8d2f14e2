//! All workspace crates inherit the workspace version and toolchain floor.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    std::fs::read_to_string(path.join("Cargo.toml"))
        .unwrap()
        .parse()
        .unwrap()
}

fn inherits(pkg: &toml::Value, key: &str) -> bool {
    pkg.get(key)
        .and_then(|v| v.as_table())
        .and_then(|t| t.get("workspace"))
        .and_then(|v| v.as_bool())
        == Some(true)
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    let doc = manifest(&root);
    let members = doc["workspace"]["members"].as_array().unwrap();
    assert!(!members.is_empty());

    for member in members {
        let dir = root.join(member.as_str().unwrap());
        let pkg = manifest(&dir)["package"].clone();
        assert!(inherits(&pkg, "version"), "{} does not inherit the workspace version", dir.display());
        assert!(
            inherits(&pkg, "rust-version"),
            "{} does not inherit rust-version",
            dir.display()
        );
    }
}

#[test]
fn compiled_version_matches_workspace() {
    let doc = manifest(&workspace_root());
    let version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(kbseed_core::VERSION, version);
}

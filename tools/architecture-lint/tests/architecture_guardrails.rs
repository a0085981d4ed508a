//! Behaviour tests running the lint over a source tree on disk.

use std::fs;
use std::path::{Path, PathBuf};

use architecture_lint::{ArchitectureLintError, Violation, lint_provider_sources};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Tree {
    dir: TempDir,
}

impl Tree {
    fn provider_dir(&self) -> PathBuf {
        self.dir.path().join("provider")
    }

    fn write(&self, file: &str, contents: &str) -> &Self {
        let path = self.provider_dir().join("src").join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directories");
        }
        fs::write(&path, contents).expect("write source file");
        self
    }

    fn lint(&self) -> Result<(), ArchitectureLintError> {
        lint_provider_sources(&self.provider_dir())
    }
}

#[fixture]
fn tree() -> Tree {
    let tree = Tree {
        dir: TempDir::new().expect("tempdir"),
    };
    tree.write(
        "domain/ports/resource_client.rs",
        "pub trait ResourceClient { fn get(&self, id: &str) -> String; }",
    )
    .write(
        "inbound/plugin/dispatcher.rs",
        concat!(
            "use crate::domain::ports::ResourceClient; ",
            "fn run(c: &dyn ResourceClient) { c.get(\"x\"); }",
        ),
    )
    .write(
        "outbound/privx/resource.rs",
        "use reqwest::Method; use crate::domain::ports::ResourceClient; pub struct Rest;",
    )
    .write("main.rs", "use clap::Parser; use provider::outbound::privx; fn main() {}")
    .write("config.rs", "use ortho_config::OrthoConfig;");
    tree
}

fn violations(outcome: Result<(), ArchitectureLintError>) -> Vec<Violation> {
    match outcome {
        Err(ArchitectureLintError::Violations(violations)) => violations,
        other => panic!("expected violations, got: {other:?}"),
    }
}

fn has_violation(violations: &[Violation], file: &str, fragment: &str) -> bool {
    violations
        .iter()
        .any(|violation| violation.file == Path::new(file) && violation.message.contains(fragment))
}

#[rstest]
fn a_layered_tree_passes(tree: Tree) {
    let outcome = tree.lint();
    assert!(outcome.is_ok(), "expected success, got: {outcome:?}");
}

#[rstest]
fn all_boundary_violations_are_reported(tree: Tree) {
    tree.write(
        "inbound/plugin/shortcut.rs",
        "use crate::outbound::privx::PrivxConnector;",
    )
    .write("domain/logging.rs", "use tracing_subscriber::EnvFilter;");

    let found = violations(tree.lint());

    assert_eq!(found.len(), 2, "{found:?}");
    assert!(has_violation(&found, "inbound/plugin/shortcut.rs", "crate::outbound"));
    assert!(has_violation(
        &found,
        "domain/logging.rs",
        "external crate `tracing_subscriber`"
    ));
}

#[rstest]
fn unparsable_sources_stop_the_lint(tree: Tree) {
    tree.write("outbound/privx/broken.rs", "fn (");
    assert!(matches!(tree.lint(), Err(ArchitectureLintError::Parse { .. })));
}

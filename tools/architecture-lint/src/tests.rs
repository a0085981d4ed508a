//! Unit tests for the architecture lint.

use std::path::PathBuf;

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Result<(), ArchitectureLintError> {
    lint_sources(&[LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    }])
}

#[rstest]
#[case::domain_uses_ports(
    "domain/reconciler.rs",
    "use super::ports::ResourceClient; use tokio_util::sync::CancellationToken;",
    true
)]
#[case::local_binding_named_like_a_module(
    "domain/credentials.rs",
    "fn resolve(config: &str) -> usize { config.len() }",
    true
)]
#[case::domain_reaches_outbound(
    "domain/registry.rs",
    "use crate::outbound::privx::PrivxSession;",
    false
)]
#[case::domain_reads_settings(
    "domain/reconciler/key_poll.rs",
    "use crate::config::RuntimeSettings;",
    false
)]
#[case::domain_speaks_http("domain/lookups.rs", "use reqwest::Client;", false)]
#[case::inbound_uses_ports(
    "inbound/plugin/dispatcher.rs",
    "use crate::domain::ports::ConnectorFactory;",
    true
)]
#[case::inbound_reaches_outbound(
    "inbound/plugin/dispatcher.rs",
    "use provider::outbound::privx::PrivxConnector;",
    false
)]
#[case::inbound_unprefixed_outbound(
    "inbound/plugin/dispatcher.rs",
    "use outbound::privx::PrivxConnector;",
    false
)]
#[case::inbound_speaks_http(
    "inbound/plugin/messages.rs",
    "fn build() { let _ = reqwest::Client::new(); }",
    false
)]
#[case::outbound_speaks_http("outbound/privx/transport.rs", "use reqwest::Client;", true)]
#[case::outbound_reaches_inbound(
    "outbound/privx/session.rs",
    "use super::super::super::inbound::plugin::Plugin;",
    false
)]
#[case::outbound_parses_cli("outbound/privx/connector.rs", "use clap::Parser;", false)]
fn detects_boundary_violations(#[case] file: &str, #[case] contents: &str, #[case] ok: bool) {
    let result = lint_one(file, contents);
    assert_eq!(result.is_ok(), ok, "result: {result:?}");
}

#[rstest]
fn files_outside_the_layers_are_rejected() {
    let result = lint_one("main.rs", "fn main() {}");
    assert!(matches!(result, Err(ArchitectureLintError::Parse { .. })));
}

#[rstest]
fn every_violation_in_a_file_is_reported_once() {
    let Err(ArchitectureLintError::Violations(violations)) = lint_one(
        "domain/registry.rs",
        "use crate::inbound::plugin; use crate::inbound::plugin::Plugin; use clap::Parser;",
    ) else {
        panic!("expected violations");
    };
    assert_eq!(violations.len(), 2, "{violations:?}");
}

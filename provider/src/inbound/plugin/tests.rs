//! Envelope handling over the in-memory PrivX fixture.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mockable::MockEnv;
use rstest::{fixture, rstest};
use serde_json::{Value as Json, json};

use super::*;
use crate::domain::attributes::REDACTED;
use crate::domain::kinds::{AccessGroup, Host};
use crate::domain::ports::{FixtureConnectorFactory, InMemoryPrivx, RemoteError};
use crate::domain::{ErrorCode, Lifecycle, ReconcilerOptions};

fn env(vars: &[(&str, &str)]) -> MockEnv {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    let mut env = MockEnv::new();
    env.expect_string()
        .times(0..)
        .returning(move |key| vars.get(key).cloned());
    env
}

struct Harness {
    privx: Arc<InMemoryPrivx>,
    factory: Arc<FixtureConnectorFactory>,
    plugin: Plugin<MockEnv>,
}

impl Harness {
    fn new(
        factory: FixtureConnectorFactory,
        privx: Arc<InMemoryPrivx>,
        vars: &[(&str, &str)],
    ) -> Self {
        let factory = Arc::new(factory);
        let plugin = Plugin::new(factory.clone(), env(vars), ReconcilerOptions::default());
        Self {
            privx,
            factory,
            plugin,
        }
    }

    async fn send(&mut self, request: Json) -> Json {
        let response = self.plugin.handle_line(&request.to_string()).await;
        serde_json::to_value(&response).expect("response serialises")
    }

    async fn configure(&mut self) {
        let response = self
            .send(json!({
                "operation": "configure",
                "provider": {
                    "api_base_url": "https://privx.example",
                    "api_bearer_token": "tok-secret"
                }
            }))
            .await;
        assert_eq!(response["ok"], json!(true), "{response}");
    }
}

#[fixture]
fn harness() -> Harness {
    let privx = Arc::new(InMemoryPrivx::default());
    Harness::new(FixtureConnectorFactory::new(privx.clone()), privx, &[])
}

fn host_attributes() -> Json {
    json!({
        "common_name": "db",
        "addresses": ["10.0.0.1"],
        "principals": [{ "principal": "root", "passphrase": "hunter2" }]
    })
}

#[rstest]
#[tokio::test]
async fn object_operations_need_a_configured_session(mut harness: Harness) {
    let response = harness
        .send(json!({ "operation": "import", "kind": "host", "id": "x" }))
        .await;
    assert_eq!(response["ok"], json!(false));
    assert_eq!(response["error"]["code"], json!("not_configured"));
    assert_eq!(harness.factory.connects(), 0);
}

#[rstest]
#[tokio::test]
async fn configure_reports_every_missing_credential() {
    let privx = Arc::new(InMemoryPrivx::default());
    let mut harness = Harness::new(FixtureConnectorFactory::new(privx.clone()), privx, &[]);

    let response = harness
        .send(json!({ "operation": "configure", "provider": {} }))
        .await;

    assert_eq!(response["error"]["code"], json!("credential_error"));
    let message = response["error"]["message"].as_str().expect("message");
    for field in ["api_base_url", "api_client_id", "api_oauth_client_secret"] {
        assert!(message.contains(field), "{message} should mention {field}");
    }
    assert!(!harness.plugin.is_configured());
    assert_eq!(harness.factory.connects(), 0);
}

#[rstest]
#[tokio::test]
async fn environment_fills_in_missing_provider_fields() {
    let privx = Arc::new(InMemoryPrivx::default());
    let mut harness = Harness::new(
        FixtureConnectorFactory::new(privx.clone()),
        privx,
        &[
            ("PRIVX_API_BASE_URL", "https://privx.example"),
            ("PRIVX_API_BEARER_TOKEN", "from-env"),
        ],
    );

    let response = harness.send(json!({ "operation": "configure" })).await;

    assert_eq!(response, json!({ "ok": true }));
    assert!(harness.plugin.is_configured());
}

#[rstest]
#[tokio::test]
async fn refused_credentials_are_scrubbed_from_the_failure() {
    let privx = Arc::new(InMemoryPrivx::default());
    let mut harness = Harness::new(
        FixtureConnectorFactory::new(privx.clone()).refusing("token tok-secret expired"),
        privx,
        &[],
    );

    let response = harness
        .send(json!({
            "operation": "configure",
            "provider": {
                "api_base_url": "https://privx.example",
                "api_bearer_token": "tok-secret"
            }
        }))
        .await;

    assert_eq!(response["error"]["code"], json!("auth_failure"));
    let message = response["error"]["message"].as_str().expect("message");
    assert!(!message.contains("tok-secret"), "{message}");
    assert!(message.contains(REDACTED));
    assert!(!harness.plugin.is_configured());
}

#[rstest]
#[tokio::test]
async fn debug_flag_flips_the_switch() {
    let privx = Arc::new(InMemoryPrivx::default());
    let factory = Arc::new(FixtureConnectorFactory::new(privx));
    let seen = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&seen);
    let mut plugin = Plugin::new(factory, env(&[]), ReconcilerOptions::default())
        .with_debug_switch(Box::new(move |debug| flag.store(debug, Ordering::SeqCst)));

    let response = plugin
        .handle_line(
            &json!({
                "operation": "configure",
                "provider": {
                    "api_base_url": "https://privx.example",
                    "api_bearer_token": "tok",
                    "debug": true
                }
            })
            .to_string(),
        )
        .await;

    assert!(response.ok);
    assert!(seen.load(Ordering::SeqCst));
}

#[rstest]
#[tokio::test]
async fn create_then_read_round_trips_state(mut harness: Harness) {
    harness.configure().await;

    let created = harness
        .send(json!({ "operation": "create", "kind": "host", "desired": host_attributes() }))
        .await;
    assert_eq!(created["ok"], json!(true), "{created}");
    assert_eq!(created["state"]["lifecycle"], json!("created"));
    let id = created["state"]["id"].as_str().expect("id").to_owned();
    assert_eq!(harness.privx.hosts.len(), 1);

    let read = harness
        .send(json!({ "operation": "read", "kind": "host", "state": created["state"] }))
        .await;
    assert_eq!(read["state"]["lifecycle"], json!("synced"));
    assert_eq!(read["state"]["id"], json!(id));
    assert_eq!(
        read["state"]["attributes"]["principals"][0]["passphrase"],
        json!("hunter2")
    );
}

#[rstest]
#[tokio::test]
async fn unchanged_declarations_round_trip_without_a_remote_update(mut harness: Harness) {
    harness.configure().await;
    let desired = json!({
        "common_name": "db",
        "addresses": ["10.0.0.1", "10.0.0.2"],
        "tags": ["b", "a"],
        "principals": [{ "principal": "root", "passphrase": "hunter2" }]
    });
    let created = harness
        .send(json!({ "operation": "create", "kind": "host", "desired": desired }))
        .await;
    let read = harness
        .send(json!({ "operation": "read", "kind": "host", "state": created["state"] }))
        .await;

    let updated = harness
        .send(json!({
            "operation": "update",
            "kind": "host",
            "state": read["state"],
            "desired": desired
        }))
        .await;

    assert_eq!(updated["ok"], json!(true), "{updated}");
    assert_eq!(updated["state"]["lifecycle"], json!("synced"));
    let calls = harness.privx.hosts.calls();
    assert!(
        !calls.iter().any(|call| call.starts_with("update")),
        "unexpected remote update: {calls:?}"
    );
}

#[rstest]
#[tokio::test]
async fn remote_rejections_never_echo_sensitive_attributes(mut harness: Harness) {
    harness.configure().await;
    harness
        .privx
        .hosts
        .reject_next(RemoteError::rejected(400_u16, "passphrase hunter2 is too short"));

    let response = harness
        .send(json!({ "operation": "create", "kind": "host", "desired": host_attributes() }))
        .await;

    assert_eq!(response["error"]["code"], json!("remote_rejected"));
    let message = response["error"]["message"].as_str().expect("message");
    assert!(!message.contains("hunter2"), "{message}");
}

#[rstest]
#[tokio::test]
async fn rejected_updates_hand_back_tainted_state(mut harness: Harness) {
    harness.configure().await;
    let id = harness.privx.hosts.seed(Host {
        name: "db".to_owned(),
        ..Host::default()
    });
    let read = harness
        .send(json!({
            "operation": "read",
            "kind": "host",
            "state": { "id": id, "lifecycle": "created", "attributes": {} }
        }))
        .await;
    harness
        .privx
        .hosts
        .reject_next(RemoteError::rejected(409_u16, "conflict"));

    let response = harness
        .send(json!({
            "operation": "update",
            "kind": "host",
            "state": read["state"],
            "desired": { "common_name": "db", "comment": "changed" }
        }))
        .await;

    assert_eq!(response["ok"], json!(false));
    assert_eq!(response["error"]["code"], json!("remote_rejected"));
    assert_eq!(response["state"]["lifecycle"], json!("tainted"));
}

#[rstest]
#[tokio::test]
async fn import_and_delete_are_dispatched_by_kind(mut harness: Harness) {
    harness.configure().await;
    let id = harness.privx.hosts.seed(Host {
        name: "db".to_owned(),
        ..Host::default()
    });

    let imported = harness
        .send(json!({ "operation": "import", "kind": "host", "id": id }))
        .await;
    assert_eq!(imported["state"]["lifecycle"], json!("synced"));

    let deleted = harness
        .send(json!({ "operation": "delete", "kind": "host", "state": imported["state"] }))
        .await;
    assert_eq!(deleted["state"]["lifecycle"], json!("gone"));
    assert!(harness.privx.hosts.is_empty());
}

#[rstest]
#[tokio::test]
async fn unknown_kinds_are_reported(mut harness: Harness) {
    harness.configure().await;
    let response = harness
        .send(json!({ "operation": "create", "kind": "printer", "desired": {} }))
        .await;
    assert_eq!(response["error"]["code"], json!("unknown_kind"));
}

#[rstest]
#[tokio::test]
async fn lookups_return_attributes(mut harness: Harness) {
    harness.configure().await;
    let id = harness.privx.access_groups.seed(AccessGroup {
        name: "ops".to_owned(),
        ..AccessGroup::default()
    });

    let found = harness
        .send(json!({
            "operation": "lookup",
            "lookup": "access_group",
            "query": { "name": "ops" }
        }))
        .await;
    assert_eq!(found["attributes"]["id"], json!(id), "{found}");

    let response = harness
        .send(json!({
            "operation": "lookup",
            "lookup": "access_group",
            "query": { "name": "missing" }
        }))
        .await;
    assert_eq!(response["error"]["code"], json!("remote_not_found"));

    let response = harness
        .send(json!({
            "operation": "lookup",
            "lookup": "access_group",
            "query": {}
        }))
        .await;
    assert_eq!(response["error"]["code"], json!("invalid_query"));
}

#[rstest]
#[case::not_json("{ nope")]
#[case::unknown_operation(r#"{"operation":"explode"}"#)]
#[tokio::test]
async fn malformed_lines_are_invalid_requests(mut harness: Harness, #[case] line: &str) {
    let response = harness.plugin.handle_line(line).await;
    assert_eq!(response.error_code(), Some(ErrorCode::InvalidRequest));
}

#[rstest]
#[tokio::test]
async fn shape_errors_do_not_echo_values(mut harness: Harness) {
    let response = harness
        .plugin
        .handle_line(r#"{"operation":"configure","provider":{"api_bearer_token":["s3cret"]}}"#)
        .await;
    let body = response.error.expect("failure");
    assert_eq!(body.code, ErrorCode::InvalidRequest);
    assert!(!body.message.contains("s3cret"));
}

#[rstest]
fn state_lifecycle_serialises_in_snake_case() {
    let response = Response::state(crate::domain::ResourceState {
        id: None,
        lifecycle: Lifecycle::Gone,
        attributes: crate::domain::attributes::Record::new(),
    });
    let json = serde_json::to_value(&response).expect("serialises");
    assert_eq!(json["state"]["lifecycle"], json!("gone"));
}

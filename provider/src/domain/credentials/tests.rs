//! Unit tests for credential resolution.

use super::*;
use mockable::MockEnv;
use rstest::rstest;
use std::collections::HashMap;

const BASE_URL: &str = "https://privx.example.com";

fn mock_env(vars: &[(&str, &str)]) -> MockEnv {
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

fn expect_error(result: Result<ResolvedConfig, CredentialError>) -> CredentialError {
    match result {
        Ok(resolved) => panic!("expected credential error, got {resolved:?}"),
        Err(error) => error,
    }
}

#[rstest]
fn bearer_token_wins_even_without_client_credentials() {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", BASE_URL),
        ("PRIVX_API_BEARER_TOKEN", "tok"),
    ]);
    let resolved = resolve_credentials(&ProviderConfig::default(), &env).expect("resolves");
    assert!(matches!(resolved.credential, Credential::BearerToken(ref t) if t.as_str() == "tok"));
    assert_eq!(resolved.base_url.as_str(), "https://privx.example.com/");
}

#[rstest]
fn empty_bearer_and_no_client_credentials_reports_all_four_fields() {
    let env = mock_env(&[("PRIVX_API_BASE_URL", BASE_URL)]);
    let err = expect_error(resolve_credentials(&ProviderConfig::default(), &env));

    assert_eq!(
        err.problems,
        vec![
            CredentialProblem::Missing(CredentialField::ClientId),
            CredentialProblem::Missing(CredentialField::ClientSecret),
            CredentialProblem::Missing(CredentialField::OauthClientId),
            CredentialProblem::Missing(CredentialField::OauthClientSecret),
        ]
    );
}

#[rstest]
fn missing_base_url_is_reported_alongside_credential_problems() {
    let env = mock_env(&[("PRIVX_API_CLIENT_ID", "id")]);
    let err = expect_error(resolve_credentials(&ProviderConfig::default(), &env));

    assert!(err.mentions(CredentialField::BaseUrl));
    assert!(!err.mentions(CredentialField::ClientId));
    assert!(err.mentions(CredentialField::ClientSecret));
    assert_eq!(err.problems.len(), 4);
}

#[rstest]
fn explicit_values_override_the_environment() {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", "https://ignored.example.com"),
        ("PRIVX_API_CLIENT_ID", "env-id"),
    ]);
    let config = ProviderConfig {
        api_base_url: Some(BASE_URL.to_owned()),
        api_client_id: Some("explicit-id".to_owned()),
        api_client_secret: Some("s1".to_owned()),
        api_oauth_client_id: Some("oid".to_owned()),
        api_oauth_client_secret: Some("s2".to_owned()),
        ..ProviderConfig::default()
    };

    let resolved = resolve_credentials(&config, &env).expect("resolves");
    assert_eq!(resolved.base_url.host_str(), Some("privx.example.com"));
    match resolved.credential {
        Credential::ClientCredentials(creds) => assert_eq!(creds.access_id, "explicit-id"),
        Credential::BearerToken(_) => panic!("expected client credentials"),
    }
}

#[rstest]
fn explicit_empty_value_does_not_fall_back_to_the_environment() {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", BASE_URL),
        ("PRIVX_API_BEARER_TOKEN", "env-token"),
    ]);
    let config = ProviderConfig {
        api_bearer_token: Some(String::new()),
        ..ProviderConfig::default()
    };
    let err = expect_error(resolve_credentials(&config, &env));
    assert!(err.mentions(CredentialField::ClientId));
}

#[rstest]
fn unparseable_base_url_is_invalid() {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", "not a url"),
        ("PRIVX_API_BEARER_TOKEN", "tok"),
    ]);
    let err = expect_error(resolve_credentials(&ProviderConfig::default(), &env));
    assert!(matches!(
        err.problems.as_slice(),
        [CredentialProblem::Invalid { field: CredentialField::BaseUrl, .. }]
    ));
}

#[rstest]
#[case("1", true)]
#[case("yes", true)]
#[case("N", false)]
#[case("false", false)]
fn debug_flag_reads_the_boolean_vocabulary(#[case] raw: &str, #[case] expected: bool) {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", BASE_URL),
        ("PRIVX_API_BEARER_TOKEN", "tok"),
        ("PRIVX_DEBUG", raw),
    ]);
    let resolved = resolve_credentials(&ProviderConfig::default(), &env).expect("resolves");
    assert_eq!(resolved.debug, expected);
}

#[rstest]
fn invalid_debug_flag_is_reported() {
    let env = mock_env(&[
        ("PRIVX_API_BASE_URL", BASE_URL),
        ("PRIVX_API_BEARER_TOKEN", "tok"),
        ("PRIVX_DEBUG", "sometimes"),
    ]);
    let err = expect_error(resolve_credentials(&ProviderConfig::default(), &env));
    assert!(err.mentions(CredentialField::Debug));
}

#[rstest]
fn diagnostics_never_show_secrets() {
    let config = ProviderConfig {
        api_bearer_token: Some("very-secret-token".to_owned()),
        api_client_secret: Some("client-secret".to_owned()),
        ..ProviderConfig::default()
    };
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("very-secret-token"));
    assert!(!rendered.contains("client-secret"));

    let credential = Credential::BearerToken(Zeroizing::new("very-secret-token".to_owned()));
    assert!(!format!("{credential:?}").contains("very-secret-token"));
    assert_eq!(credential.secrets(), vec!["very-secret-token".to_owned()]);
}

#[rstest]
fn rendered_error_lists_every_problem_in_order() {
    let err = CredentialError {
        problems: vec![
            CredentialProblem::Missing(CredentialField::ClientId),
            CredentialProblem::Invalid {
                field: CredentialField::BaseUrl,
                reason: "relative URL without a base".to_owned(),
            },
        ],
    };

    assert_eq!(
        err.to_string(),
        "provider configuration is incomplete: \
         missing api_client_id (or PRIVX_API_CLIENT_ID); \
         invalid api_base_url (or PRIVX_API_BASE_URL): relative URL without a base"
    );
}

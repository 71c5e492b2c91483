//! # 关联值与重定向校验的性质测试

mod common;

use common::{CLIENT_ID, COMPLETION, auth_query, fragment_param};
use link_relay::config::RelayConfig;
use link_relay::error::LinkError;
use link_relay::linking::{
    AuthorizationRequest, CallbackParams, CompletionRedirect, UpstreamRedirectBuilder,
    collect_params,
};
use proptest::prelude::*;

fn config() -> RelayConfig {
    RelayConfig::new(CLIENT_ID, "shh", "proj1", "https://relay.example.org/exch")
        .with_platform_domain("example.com")
}

/// 走完两跳后从完成地址片段中取回的 `state`
fn round_trip(state: &str) -> Option<String> {
    let config = config();
    let builder = UpstreamRedirectBuilder::new(&config).ok()?;

    let validated = AuthorizationRequest::from_query(&auth_query(CLIENT_ID, COMPLETION, state))
        .validate(&config)
        .ok()?;
    let consent = builder.build(&validated);
    let provider_state = consent
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())?;

    let callback = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("code", "C")
        .append_pair("state", &provider_state)
        .finish();
    let params = CallbackParams::extract(&collect_params(None, Some(callback.as_bytes()))).ok()?;

    let completion = CompletionRedirect::new(&config, "token", &params.state);
    fragment_param(completion.as_str(), "state")
}

proptest! {
    #[test]
    fn state_survives_every_hop(state in ".{1,1024}") {
        prop_assert_eq!(round_trip(&state), Some(state));
    }

    #[test]
    fn state_reaches_consent_url_unchanged(state in "[ -~]{0,256}") {
        let config = config();
        let builder = UpstreamRedirectBuilder::new(&config).unwrap();
        let validated = AuthorizationRequest::from_query(&auth_query(CLIENT_ID, COMPLETION, &state))
            .validate(&config)
            .unwrap();
        let consent = builder.build(&validated);
        let carried: Vec<String> = consent
            .query_pairs()
            .filter(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .collect();
        prop_assert_eq!(carried, vec![state]);
    }

    #[test]
    fn other_scheme_is_invalid_redirect(scheme in "(http|ftp|wss|file|javascript)") {
        let redirect = format!("{scheme}://oauth-redirect.example.com/r/proj1");
        let err = AuthorizationRequest::from_query(&auth_query(CLIENT_ID, &redirect, "s"))
            .validate(&config())
            .unwrap_err();
        let is_invalid_redirect = matches!(err, LinkError::InvalidRedirect { .. });
        prop_assert!(is_invalid_redirect);
    }

    #[test]
    fn other_host_is_invalid_redirect(label in "[a-z][a-z0-9-]{0,15}") {
        prop_assume!(label != "oauth-redirect");
        let redirect = format!("https://{label}.example.com/r/proj1");
        let err = AuthorizationRequest::from_query(&auth_query(CLIENT_ID, &redirect, "s"))
            .validate(&config())
            .unwrap_err();
        let is_invalid_redirect = matches!(err, LinkError::InvalidRedirect { .. });
        prop_assert!(is_invalid_redirect);
    }

    #[test]
    fn other_project_is_invalid_redirect(project in "[a-zA-Z0-9_-]{1,16}") {
        prop_assume!(project != "proj1");
        let redirect = format!("https://oauth-redirect.example.com/r/{project}");
        let err = AuthorizationRequest::from_query(&auth_query(CLIENT_ID, &redirect, "s"))
            .validate(&config())
            .unwrap_err();
        let is_invalid_redirect = matches!(err, LinkError::InvalidRedirect { .. });
        prop_assert!(is_invalid_redirect);
    }

    #[test]
    fn wrong_client_always_wins(
        client_id in "[a-zA-Z0-9.-]{0,24}",
        redirect in prop_oneof![
            Just(COMPLETION.to_string()),
            Just("https://oauth-redirect.example.com/r/proj2".to_string()),
            "[ -~]{0,40}",
        ],
    ) {
        prop_assume!(client_id != CLIENT_ID);
        let err = AuthorizationRequest::from_query(&auth_query(&client_id, &redirect, "s"))
            .validate(&config())
            .unwrap_err();
        let is_invalid_client = matches!(err, LinkError::InvalidClient { .. });
        prop_assert!(is_invalid_client);
    }
}

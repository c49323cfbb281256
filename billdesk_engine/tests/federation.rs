use std::time::Duration;

use billdesk_engine::{
    registry_types::RegistryKey,
    test_utils::{
        in_memory::{InMemoryRegistries, RegistryCall},
        prepare_env::prepare_test_env,
    },
    traits::RegistryError,
    ClientLookupApi,
    LookupError,
    ProbeStrategy,
};

mod support;
use support::{client, directory};

fn keys(names: &[&str]) -> Vec<RegistryKey> {
    names.iter().map(|n| RegistryKey::from(*n)).collect()
}

fn registries() -> InMemoryRegistries {
    let registries = InMemoryRegistries::new();
    registries.add_client("R1", client(10, "V-100", "Ana Pérez"));
    registries.add_client("R2", client(20, "V-100", "Ana Pérez"));
    registries.add_client("R2", client(21, "V-200", "Luis Gómez"));
    registries.add_client("R3", client(30, "V-300", "Carla Ruiz"));
    registries
}

#[tokio::test]
async fn first_registry_in_candidate_order_wins() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    let session = api.search_federated("V-100", &keys(&["R2", "R1"])).await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R2");
    assert_eq!(session.client_id(), 20);
    // Sequential probing stops at the first match
    assert!(registries.calls_to("R1").is_empty());

    let session = api.search_all("V-100").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R1");
    assert_eq!(session.client_id(), 10);
}

#[tokio::test]
async fn failing_registries_are_skipped() {
    prepare_test_env();
    let registries = registries();
    registries.fail_with("R1", RegistryError::Unreachable("connection refused".into()));
    let api = ClientLookupApi::new(&registries, directory());

    let session = api.search_all("V-100").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R2");
    assert_eq!(registries.calls_to("R1").len(), 1);
}

#[tokio::test]
async fn not_found_reports_failed_registries() {
    prepare_test_env();
    let registries = registries();
    registries.fail_with("R1", RegistryError::AuthRequired);
    registries.fail_with("R3", RegistryError::Unreachable("503 Service Unavailable".into()));
    let api = ClientLookupApi::new(&registries, directory());

    let err = api.search_all("V-999").await.unwrap_err();
    assert_eq!(err, LookupError::NotFound { failed: keys(&["R1", "R3"]) });
    assert_eq!(registries.calls().len(), 3);

    registries.recover("R1");
    registries.recover("R3");
    let err = api.search_all("V-999").await.unwrap_err();
    assert_eq!(err, LookupError::NotFound { failed: vec![] });
}

#[tokio::test]
async fn other_registry_errors_end_the_search() {
    prepare_test_env();
    let registries = registries();
    registries.fail_with("R1", RegistryError::Rejected { status: 403, message: "Forbidden".into() });
    let api = ClientLookupApi::new(&registries, directory());

    // R2 has a match, but the search never gets there
    let err = api.search_all("V-100").await.unwrap_err();
    assert_eq!(err, LookupError::Rejected { registry: "R1".into(), status: 403, message: "Forbidden".into() });
    assert!(registries.calls_to("R2").is_empty());

    registries.recover("R1");
    registries.fail_with("R2", RegistryError::MalformedResponse("expected an array".into()));
    let err = api.search_all("V-200").await.unwrap_err();
    assert_eq!(err, LookupError::MalformedResponse { registry: "R2".into(), reason: "expected an array".into() });
    assert!(registries.calls_to("R3").is_empty());

    // A failing registry after the winner is never asked
    let session = api.search_all("V-100").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R1");
}

#[tokio::test]
async fn parallel_search_surfaces_other_errors_in_candidate_order() {
    prepare_test_env();
    let registries = registries();
    registries.delay("R1", Duration::from_millis(30));
    registries.fail_with("R1", RegistryError::MalformedResponse("truncated body".into()));
    let api = ClientLookupApi::new(&registries, directory()).with_strategy(ProbeStrategy::Parallel);

    // R2 answers first with a match, but R1's error comes earlier in the candidate list
    let err = api.search_all("V-100").await.unwrap_err();
    assert_eq!(err, LookupError::MalformedResponse { registry: "R1".into(), reason: "truncated body".into() });

    registries.recover("R1");
    registries.fail_with("R3", RegistryError::Rejected { status: 400, message: "bad query".into() });
    let session = api.search_all("V-100").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R1");
    let err = api.search_all("V-999").await.unwrap_err();
    assert_eq!(err, LookupError::Rejected { registry: "R3".into(), status: 400, message: "bad query".into() });
}

#[tokio::test]
async fn repeated_candidates_are_searched_once() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    let err = api.search_federated("V-999", &keys(&["R2", "R2"])).await.unwrap_err();
    assert_eq!(err, LookupError::NotFound { failed: vec![] });
    assert_eq!(registries.calls_to("R2").len(), 1);

    registries.clear_calls();
    registries.fail_with("R2", RegistryError::AuthRequired);
    let api = api.with_strategy(ProbeStrategy::Parallel);
    let err = api.search_federated("V-300", &keys(&["R2", "R1", "R2"])).await.unwrap_err();
    assert_eq!(err, LookupError::NotFound { failed: keys(&["R2"]) });
    assert_eq!(registries.calls_to("R2").len(), 1);
    assert_eq!(registries.calls_to("R1").len(), 1);
}

#[tokio::test]
async fn unknown_registries_fail_before_any_search() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    let err = api.search_federated("V-100", &keys(&["R1", "R9"])).await.unwrap_err();
    assert_eq!(err, LookupError::UnknownRegistry("R9".into()));
    let err = api.search_one("V-100", &"R9".into()).await.unwrap_err();
    assert_eq!(err, LookupError::UnknownRegistry("R9".into()));
    assert!(registries.calls().is_empty());
}

#[tokio::test]
async fn blank_queries_are_rejected() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    assert_eq!(api.search_all("  ").await.unwrap_err(), LookupError::InvalidQuery);
    assert_eq!(api.search_one("", &"R1".into()).await.unwrap_err(), LookupError::InvalidQuery);
    assert!(registries.calls().is_empty());
}

#[tokio::test]
async fn search_one_returns_empty_results() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    assert!(api.search_one("V-300", &"R1".into()).await.unwrap().is_empty());
    let found = api.search_one(" v-300 ", &"R3".into()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(
        registries.calls_to("R3"),
        vec![RegistryCall::Search { registry: "R3".into(), query: "v-300".into() }]
    );
}

#[tokio::test]
async fn focus_moves_between_matches_of_the_same_registry() {
    prepare_test_env();
    let registries = registries();
    registries.add_client("R2", client(22, "V-201", "Ana Pérez de Gómez"));
    let api = ClientLookupApi::new(&registries, directory());

    let mut session = api.search_federated("ana", &keys(&["R2"])).await.unwrap();
    assert_eq!(session.matches().len(), 2);
    assert_eq!(session.focus(22).unwrap().identification, "V-201");
    assert_eq!(session.focus(10).unwrap_err(), LookupError::NotAMatch(10));
    assert_eq!(session.registry_key().as_str(), "R2");
}

#[tokio::test]
async fn parallel_search_keeps_candidate_order() {
    prepare_test_env();
    let registries = registries();
    registries.delay("R1", Duration::from_millis(50));
    let api = ClientLookupApi::new(&registries, directory()).with_strategy(ProbeStrategy::Parallel);

    // R2 answers first, but R1 comes earlier in the candidate list
    let session = api.search_all("V-100").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R1");
    assert_eq!(session.client_id(), 10);

    // A later registry wins once every earlier one is known to be empty
    let session = api.search_all("V-200").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R2");
}

#[tokio::test]
async fn parallel_search_reports_failures_in_candidate_order() {
    prepare_test_env();
    let registries = registries();
    registries.delay("R1", Duration::from_millis(30));
    registries.fail_with("R1", RegistryError::Unreachable("timeout".into()));
    registries.fail_with("R3", RegistryError::Unreachable("timeout".into()));
    let api = ClientLookupApi::new(&registries, directory()).with_strategy(ProbeStrategy::Parallel);

    let err = api.search_all("V-999").await.unwrap_err();
    assert_eq!(err, LookupError::NotFound { failed: keys(&["R1", "R3"]) });

    let session = api.search_all("V-300").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R3");
}

#[tokio::test]
async fn refresh_reads_from_the_bound_registry() {
    prepare_test_env();
    let registries = registries();
    let api = ClientLookupApi::new(&registries, directory());

    let mut session = api.search_federated("V-100", &keys(&["R2"])).await.unwrap();
    registries.clear_calls();
    let mut changed = client(20, "V-100", "Ana Pérez");
    changed.name = "Ana P. Pérez".into();
    registries.remove_client("R2", 20);
    registries.add_client("R2", changed);

    let fresh = api.refresh(&mut session).await.unwrap();
    assert_eq!(fresh.name, "Ana P. Pérez");
    assert_eq!(session.client().name, "Ana P. Pérez");
    assert!(registries.calls().iter().all(|c| c.registry().as_str() == "R2"));

    registries.remove_client("R2", 20);
    let err = api.refresh(&mut session).await.unwrap_err();
    assert_eq!(err, LookupError::ClientVanished { registry: "R2".into(), client_id: 20 });
    assert_eq!(session.client().name, "Ana P. Pérez");
}

use billdesk_common::{LocalAmount, RefAmount};
use billdesk_engine::{
    registry_types::{ClientStatus, PaymentEntry, PaymentMethod},
    test_utils::{
        in_memory::{InMemoryRegistries, RegistryCall},
        prepare_env::prepare_test_env,
    },
    traits::{ExchangeRateProvider, RateError},
    ClientLookupApi,
    ExchangeRate,
    ExchangeRateApi,
    PaymentApi,
    PaymentError,
    ResolvedSession,
};
use log::*;
use rust_decimal_macros::dec;

mod support;
use support::{client, directory, operator, payment};

struct FixedRate;

impl ExchangeRateProvider for FixedRate {
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        Ok(ExchangeRate::new(dec!(36.5), None))
    }
}

fn registries() -> InMemoryRegistries {
    let registries = InMemoryRegistries::new();
    let mut debtor = client(40, "V-400", "Marta Salas");
    debtor.balance = RefAmount::from(dec!(-25));
    registries.add_client("R1", client(10, "V-100", "Ana Pérez"));
    registries.add_client("R3", debtor);
    registries.add_operator("R3", operator("4", "Front desk"));
    registries.add_operator("R3", operator("5", "Collections"));
    registries
}

async fn session_for(registries: &InMemoryRegistries, query: &str) -> ResolvedSession {
    let session = ClientLookupApi::new(registries, directory()).search_all(query).await.unwrap();
    registries.clear_calls();
    session
}

fn entry(reference: &str) -> PaymentEntry {
    PaymentEntry::new(
        RefAmount::from(dec!(25)),
        LocalAmount::from(dec!(985.50)),
        PaymentMethod::Transfer,
        "4",
        reference,
    )
}

#[tokio::test]
async fn payment_desk_scenario() {
    prepare_test_env();
    info!("🚀️ Starting payment desk scenario");
    let registries = registries();
    let lookup = ClientLookupApi::new(&registries, directory());
    let payments = PaymentApi::new(&registries, directory());
    let rates = ExchangeRateApi::new(FixedRate);

    let mut session = lookup.search_all("V-400").await.unwrap();
    assert_eq!(session.registry_key().as_str(), "R3");
    assert!(!session.client().is_in_good_standing());
    registries.clear_calls();

    let me = lookup.who_am_i(session.registry_key()).await.unwrap();
    assert_eq!(me.name.as_deref(), Some("Front desk"));
    assert_eq!(lookup.list_operators(session.registry_key()).await.unwrap().len(), 2);

    // The operator types the reference amount; the local amount is filled in at the current rate
    let round = rates.begin_round().await.unwrap();
    let (amount_reference, amount_local) = round.complete(Some(RefAmount::from(dec!(25))), None).unwrap();
    assert_eq!(amount_local.value(), dec!(985.50));
    let entry = PaymentEntry::new(amount_reference, amount_local, PaymentMethod::Cash, me.id.clone(), " REC-77 ")
        .with_comment("Paid at the office")
        .with_creator(me.id.clone());
    let record = payments.record_payment(&mut session, entry).await.unwrap();
    assert_eq!(record.reference, "REC-77");
    assert_eq!(record.comment.as_deref(), Some("Paid at the office"));

    // Nothing is refreshed automatically
    assert_eq!(session.client().balance.value(), dec!(-25));
    let fresh = lookup.refresh(&mut session).await.unwrap();
    assert_eq!(fresh.balance.value(), dec!(0));
    assert!(session.client().is_in_good_standing());

    let resent = payments.resend_last_receipt(&session).await.unwrap();
    assert_eq!(resent.reference, "REC-77");
    let calls = registries.calls();
    assert!(calls.iter().all(|c| c.registry().as_str() == "R3"));
    assert!(calls.contains(&RegistryCall::SendReceipt { registry: "R3".into(), payment_id: 1 }));
    info!("🚀️ Payment desk scenario complete");
}

#[tokio::test]
async fn echoed_payments_are_returned_as_stored() {
    prepare_test_env();
    let registries = registries();
    registries.echo_payments("R1", true);
    registries.add_payment("R1", 10, payment(Some(41), 20, "OLD"));
    let mut session = session_for(&registries, "V-100").await;
    let api = PaymentApi::new(&registries, directory());

    let record = api.record_payment(&mut session, entry("NEW")).await.unwrap();
    assert_eq!(record.id, Some(42));
    let stored = registries.payments("R1", 10);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].reference, "NEW");
}

#[tokio::test]
async fn invalid_payments_are_never_sent() {
    prepare_test_env();
    let registries = registries();
    let mut session = session_for(&registries, "V-100").await;
    let api = PaymentApi::new(&registries, directory());

    let mut zero = entry("X");
    zero.amount_reference = RefAmount::ZERO;
    let mut no_operator = entry("X");
    no_operator.received_by = "".into();
    for bad in [zero, no_operator, entry("   ")] {
        let err = api.record_payment(&mut session, bad).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPayment(_)), "{err}");
    }
    let err: PaymentError = "Crypto".parse::<PaymentMethod>().unwrap_err().into();
    assert!(matches!(err, PaymentError::InvalidPayment(_)));
    assert!(registries.calls().is_empty());
}

#[tokio::test]
async fn status_toggles_between_active_and_suspended() {
    prepare_test_env();
    let registries = registries();
    let mut session = session_for(&registries, "V-100").await;
    let lookup = ClientLookupApi::new(&registries, directory());
    let api = PaymentApi::new(&registries, directory());

    assert_eq!(api.toggle_status(&mut session).await.unwrap(), ClientStatus::Suspended);
    assert_eq!(registries.client("R1", 10).unwrap().status, ClientStatus::Suspended);
    lookup.refresh(&mut session).await.unwrap();
    assert_eq!(api.toggle_status(&mut session).await.unwrap(), ClientStatus::Active);

    let err = api.set_status(&mut session, ClientStatus::Other("Retirado".into())).await.unwrap_err();
    assert_eq!(err, PaymentError::InvalidTransition(ClientStatus::Other("Retirado".into())));
    assert_eq!(registries.calls().iter().filter(|c| matches!(c, RegistryCall::UpdateStatus { .. })).count(), 2);
}

#[tokio::test]
async fn clients_in_other_states_are_activated() {
    prepare_test_env();
    let registries = InMemoryRegistries::new();
    let mut retired = client(50, "V-500", "Pedro Mora");
    retired.status = ClientStatus::Other("Retirado".into());
    registries.add_client("R2", retired);
    let mut session = session_for(&registries, "V-500").await;
    let api = PaymentApi::new(&registries, directory());

    assert_eq!(api.toggle_status(&mut session).await.unwrap(), ClientStatus::Active);
    assert_eq!(registries.client("R2", 50).unwrap().status, ClientStatus::Active);
}

#[tokio::test]
async fn resending_needs_a_payment_with_an_id() {
    prepare_test_env();
    let registries = registries();
    let session = session_for(&registries, "V-100").await;
    let api = PaymentApi::new(&registries, directory());

    assert_eq!(api.resend_last_receipt(&session).await.unwrap_err(), PaymentError::NothingToSend);

    registries.add_payment("R1", 10, payment(None, 20, "NO-ID"));
    let err = api.resend_last_receipt(&session).await.unwrap_err();
    assert!(matches!(err, PaymentError::MalformedResponse { .. }), "{err}");
    assert!(!registries.calls().iter().any(|c| matches!(c, RegistryCall::SendReceipt { .. })));
}

#[tokio::test]
async fn resending_leaves_the_session_alone() {
    prepare_test_env();
    let registries = registries();
    registries.add_payment("R1", 10, payment(Some(5), 20, "REC-5"));
    let session = session_for(&registries, "V-100").await;
    let api = PaymentApi::new(&registries, directory());

    let before = session.client();
    let (first, second) = tokio::join!(api.resend_last_receipt(&session), api.resend_last_receipt(&session));
    assert_eq!(first.unwrap().id, Some(5));
    assert_eq!(second.unwrap().id, Some(5));
    assert_eq!(session.client(), before);
    let sent = registries.calls().into_iter().filter(|c| matches!(c, RegistryCall::SendReceipt { .. })).count();
    assert_eq!(sent, 2);
}

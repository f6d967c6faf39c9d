// [tests/mirror/libs/infra/db/credits_reset.test.rs]
/**
 * =================================================================
 * APARATO: ATOMIC BALANCE RESET TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DEL REINICIO DE DOBLE ASIENTO
 * =================================================================
 */

use tesoro_domain_ledger::{DeltaMetadata, HistoryFilter, ResetDescriptions, TransactionType};
use tesoro_infra_db::repositories::CreditLedgerRepository;
use tesoro_infra_db::{LedgerClient, LedgerError};

async fn ledger(test_name: &str) -> CreditLedgerRepository {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");
    CreditLedgerRepository::new(client)
}

fn descriptions() -> ResetDescriptions {
    ResetDescriptions {
        expire: Some("Unused balance expired".to_string()),
        forgiven: Some("Negative balance forgiven".to_string()),
        grant: Some("Renewal allocation".to_string()),
    }
}

#[tokio::test]
async fn certify_reset_from_positive_expires_remainder() {
    let repository = ledger("reset_positive").await;
    let metadata = DeltaMetadata::default();

    repository.grant("user_1", "api_calls", 700, &metadata).await.unwrap();

    let outcome = repository
        .atomic_balance_reset("user_1", "api_calls", 1000, &metadata, &descriptions())
        .await
        .unwrap();

    assert_eq!(outcome.previous_balance, 700);
    assert_eq!(outcome.expired, 700);
    assert_eq!(outcome.forgiven, 0);
    assert_eq!(outcome.new_balance, 1000);
    assert_eq!(repository.get_balance("user_1", "api_calls").await.unwrap(), 1000);
}

#[tokio::test]
async fn certify_reset_from_negative_forgives_debt() {
    let repository = ledger("reset_negative").await;
    let metadata = DeltaMetadata::default();

    repository.consume("user_2", "api_calls", 300, &metadata).await.unwrap();

    let outcome = repository
        .atomic_balance_reset("user_2", "api_calls", 1000, &metadata, &descriptions())
        .await
        .unwrap();

    assert_eq!(outcome.previous_balance, -300);
    assert_eq!(outcome.expired, 0);
    assert_eq!(outcome.forgiven, 300);
    assert_eq!(outcome.new_balance, 1000);

    // El asiento de perdón es un ajuste positivo que aterriza en cero.
    let history = repository
        .get_history("user_2", &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history[1].transaction_type, TransactionType::Adjust);
    assert_eq!(history[1].amount, 300);
    assert_eq!(history[1].balance_after, 0);
    assert_eq!(history[1].description.as_deref(), Some("Negative balance forgiven"));
}

#[tokio::test]
async fn certify_reset_from_zero_skips_closing_entry() {
    let repository = ledger("reset_zero").await;
    let metadata = DeltaMetadata::default();

    let outcome = repository
        .atomic_balance_reset("user_3", "api_calls", 500, &metadata, &descriptions())
        .await
        .unwrap();

    assert_eq!(outcome.previous_balance, 0);
    assert_eq!(outcome.expired, 0);
    assert_eq!(outcome.forgiven, 0);
    assert_eq!(outcome.new_balance, 500);

    // Un solo asiento: el grant de la nueva asignación.
    let history = repository
        .get_history("user_3", &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::Grant);
}

#[tokio::test]
async fn certify_reset_to_zero_allocation_only_closes() {
    let repository = ledger("reset_to_zero").await;
    let metadata = DeltaMetadata::default();

    repository.grant("user_4", "api_calls", 250, &metadata).await.unwrap();

    let outcome = repository
        .atomic_balance_reset("user_4", "api_calls", 0, &metadata, &descriptions())
        .await
        .unwrap();

    assert_eq!(outcome.expired, 250);
    assert_eq!(outcome.new_balance, 0);
    assert_eq!(repository.get_balance("user_4", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_reset_idempotency_binds_whole_operation() {
    let repository = ledger("reset_idempotency").await;
    let keyed = DeltaMetadata {
        idempotency_key: Some("renewal:sub_9:in_9".to_string()),
        ..Default::default()
    };

    repository.grant("user_5", "api_calls", 400, &DeltaMetadata::default()).await.unwrap();
    repository
        .atomic_balance_reset("user_5", "api_calls", 1000, &keyed, &descriptions())
        .await
        .unwrap();

    // El replay del reinicio completo aborta sin tocar el ledger.
    match repository
        .atomic_balance_reset("user_5", "api_calls", 1000, &keyed, &descriptions())
        .await
    {
        Err(LedgerError::IdempotencyConflict(_)) => {}
        other => panic!("L3_LEDGER_FAULT: expected conflict, got {:?}", other),
    }

    let history = repository
        .get_history("user_5", &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3, "replayed reset must not append entries");
    assert_eq!(repository.get_balance("user_5", "api_calls").await.unwrap(), 1000);
}

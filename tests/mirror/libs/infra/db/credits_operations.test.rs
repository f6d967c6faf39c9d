// [tests/mirror/libs/infra/db/credits_operations.test.rs]
/**
 * =================================================================
 * APARATO: CREDIT OPERATIONS TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE LAS OPERACIONES BASE DEL LEDGER
 * =================================================================
 */

use tesoro_domain_ledger::{DeltaMetadata, WALLET_RESERVED_KEY};
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

#[tokio::test]
async fn certify_grant_consume_arithmetic() {
    let repository = ledger("ops_arithmetic").await;
    let metadata = DeltaMetadata::default();

    let granted = repository.grant("user_1", "api_calls", 1000, &metadata).await.unwrap();
    assert_eq!(granted.previous_balance, 0);
    assert_eq!(granted.new_balance, 1000);

    let consumed = repository.consume("user_1", "api_calls", 300, &metadata).await.unwrap();
    assert!(consumed.success);
    assert_eq!(consumed.balance, 700);

    // grant(x); consume(x) deja el saldo intacto.
    repository.grant("user_1", "api_calls", 42, &metadata).await.unwrap();
    repository.consume("user_1", "api_calls", 42, &metadata).await.unwrap();
    assert_eq!(repository.get_balance("user_1", "api_calls").await.unwrap(), 700);
}

#[tokio::test]
async fn certify_consume_never_blocks_and_goes_negative() {
    let repository = ledger("ops_negative").await;
    let metadata = DeltaMetadata::default();

    // Consumo sobre saldo vacío: permitido, saldo negativo.
    let consumed = repository.consume("user_2", "api_calls", 250, &metadata).await.unwrap();
    assert!(consumed.success);
    assert_eq!(consumed.balance, -250);

    let consumed_again = repository.consume("user_2", "api_calls", 50, &metadata).await.unwrap();
    assert_eq!(consumed_again.balance, -300);
}

#[tokio::test]
async fn certify_revoke_caps_at_positive_balance() {
    let repository = ledger("ops_revoke").await;
    let metadata = DeltaMetadata::default();

    repository.grant("user_3", "api_calls", 100, &metadata).await.unwrap();

    // revoke(500) con saldo 100: revoca 100 y aterriza en 0.
    let revoked = repository.revoke("user_3", "api_calls", 500, &metadata).await.unwrap();
    assert_eq!(revoked.amount_revoked, 100);
    assert_eq!(revoked.balance, 0);

    // Con saldo <= 0 la revocación es un no-op.
    repository.consume("user_3", "api_calls", 40, &metadata).await.unwrap();
    let revoked_on_debt = repository.revoke("user_3", "api_calls", 10, &metadata).await.unwrap();
    assert_eq!(revoked_on_debt.amount_revoked, 0);
    assert_eq!(revoked_on_debt.balance, -40);
}

#[tokio::test]
async fn certify_revoke_all_drains_positive_balance() {
    let repository = ledger("ops_revoke_all").await;
    let metadata = DeltaMetadata::default();

    repository.grant("user_4", "api_calls", 800, &metadata).await.unwrap();
    let drained = repository.revoke_all("user_4", "api_calls", &metadata).await.unwrap();
    assert_eq!(drained.amount_revoked, 800);
    assert_eq!(drained.balance, 0);

    let drained_again = repository.revoke_all("user_4", "api_calls", &metadata).await.unwrap();
    assert_eq!(drained_again.amount_revoked, 0);
}

#[tokio::test]
async fn certify_set_balance_adjusts_to_arbitrary_targets() {
    let repository = ledger("ops_set_balance").await;
    let metadata = DeltaMetadata::default();

    repository.grant("user_5", "storage_gb", 50, &metadata).await.unwrap();

    let adjusted = repository.set_balance("user_5", "storage_gb", 20, &metadata).await.unwrap();
    assert_eq!(adjusted.previous_balance, 50);
    assert_eq!(adjusted.balance, 20);

    // Objetivos negativos permitidos.
    let negative_target =
        repository.set_balance("user_5", "storage_gb", -15, &metadata).await.unwrap();
    assert_eq!(negative_target.balance, -15);
    assert_eq!(repository.get_balance("user_5", "storage_gb").await.unwrap(), -15);
}

#[tokio::test]
async fn certify_amount_validation_rejects_non_positive() {
    let repository = ledger("ops_validation").await;
    let metadata = DeltaMetadata::default();

    for fault in [
        repository.grant("user_6", "api_calls", 0, &metadata).await.err(),
        repository.grant("user_6", "api_calls", -10, &metadata).await.err(),
        repository.consume("user_6", "api_calls", 0, &metadata).await.err(),
        repository.revoke("user_6", "api_calls", -1, &metadata).await.err(),
    ] {
        match fault {
            Some(LedgerError::InvalidAmount(_)) => {}
            other => panic!("L3_LEDGER_FAULT: expected INVALID_AMOUNT, got {:?}", other),
        }
    }

    // El ledger queda intacto tras los rechazos.
    assert_eq!(repository.get_balance("user_6", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_balance_reads_and_reserved_key_exclusion() {
    let repository = ledger("ops_reads").await;
    let metadata = DeltaMetadata::default();

    // Pareja jamás vista: saldo cero, sin error.
    assert_eq!(repository.get_balance("ghost", "api_calls").await.unwrap(), 0);

    repository.grant("user_7", "api_calls", 500, &metadata).await.unwrap();
    repository.grant("user_7", "storage_gb", 10, &metadata).await.unwrap();
    repository.grant("user_7", WALLET_RESERVED_KEY, 1_000_000, &metadata).await.unwrap();

    assert!(repository.has_credits("user_7", "api_calls", 500).await.unwrap());
    assert!(!repository.has_credits("user_7", "api_calls", 501).await.unwrap());

    let balances = repository
        .get_all_balances("user_7", &[WALLET_RESERVED_KEY])
        .await
        .unwrap();
    assert_eq!(balances.len(), 2, "reserved wallet key leaked into balances map");
    assert_eq!(balances.get("api_calls"), Some(&500));
    assert_eq!(balances.get("storage_gb"), Some(&10));
}

// [tests/mirror/libs/infra/db/wallet_precision.test.rs]
/**
 * =================================================================
 * APARATO: WALLET PRECISION TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE ESCALA MICRO-CENTAVO Y DIVISA
 * =================================================================
 */

use tesoro_domain_ledger::{DeltaMetadata, WalletEntryKind, WALLET_RESERVED_KEY};
use tesoro_infra_db::repositories::{CreditLedgerRepository, WalletRepository};
use tesoro_infra_db::{LedgerClient, LedgerError};

async fn harness(test_name: &str) -> (CreditLedgerRepository, WalletRepository) {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");
    (CreditLedgerRepository::new(client.clone()), WalletRepository::new(client))
}

#[tokio::test]
async fn certify_sub_cent_balance_renders_with_precision() {
    let (credits, wallet) = harness("wallet_sub_cent").await;

    // Saldo inyectado directo en el ledger: 1.500.000 µc = 1.5 centavos.
    credits
        .grant("user_1", WALLET_RESERVED_KEY, 1_500_000, &DeltaMetadata::default())
        .await
        .unwrap();

    let balance = wallet.get_balance("user_1").await.unwrap().expect("wallet row missing");
    assert_eq!(balance.cents, 1.5);
    assert_eq!(balance.formatted, "$0.015");
}

#[tokio::test]
async fn certify_zero_decimal_currency_formatting() {
    let (_credits, wallet) = harness("wallet_jpy").await;

    wallet.add("user_2", 1234.0, Some("jpy"), &DeltaMetadata::default()).await.unwrap();

    let balance = wallet.get_balance("user_2").await.unwrap().unwrap();
    assert_eq!(balance.currency.as_deref(), Some("jpy"));
    assert_eq!(balance.formatted, "¥1234");
}

#[tokio::test]
async fn certify_add_consume_cancels_to_zero() {
    let (_credits, wallet) = harness("wallet_cancel").await;
    let metadata = DeltaMetadata::default();

    wallet.add("user_3", 250.0, Some("usd"), &metadata).await.unwrap();
    wallet.consume("user_3", 250.0, Some("usd"), &metadata).await.unwrap();

    let balance = wallet.get_balance("user_3").await.unwrap().unwrap();
    assert_eq!(balance.cents, 0.0);
    assert_eq!(balance.formatted, "$0.00");
}

#[tokio::test]
async fn certify_consume_on_empty_goes_negative() {
    let (_credits, wallet) = harness("wallet_negative").await;

    let outcome = wallet
        .consume("user_4", 100.0, Some("usd"), &DeltaMetadata::default())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.balance, -100_000_000);

    let balance = wallet.get_balance("user_4").await.unwrap().unwrap();
    assert_eq!(balance.cents, -100.0);
    assert_eq!(balance.formatted, "-$1.00");
}

#[tokio::test]
async fn certify_currency_anchor_rejects_mismatch() {
    let (_credits, wallet) = harness("wallet_anchor").await;
    let metadata = DeltaMetadata::default();

    wallet.add("user_5", 100.0, Some("usd"), &metadata).await.unwrap();

    // La fila quedó anclada a usd; jpy es rechazado sin tocar el saldo.
    match wallet.add("user_5", 100.0, Some("jpy"), &metadata).await {
        Err(LedgerError::CurrencyMismatch { pinned, supplied }) => {
            assert_eq!(pinned, "usd");
            assert_eq!(supplied, "jpy");
        }
        other => panic!("L3_LEDGER_FAULT: expected CURRENCY_MISMATCH, got {:?}", other),
    }
    assert_eq!(wallet.get_balance("user_5").await.unwrap().unwrap().cents, 100.0);
}

#[tokio::test]
async fn certify_missing_wallet_is_null_not_zero() {
    let (_credits, wallet) = harness("wallet_null").await;
    assert!(wallet.get_balance("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn certify_history_renders_grant_as_add() {
    let (_credits, wallet) = harness("wallet_history").await;
    let metadata = DeltaMetadata::default();

    wallet.add("user_6", 500.0, Some("usd"), &metadata).await.unwrap();
    wallet.consume("user_6", 120.5, Some("usd"), &metadata).await.unwrap();

    let history = wallet.get_history("user_6", 50, 0).await.unwrap();
    assert_eq!(history.len(), 2);

    assert_eq!(history[0].entry_type, WalletEntryKind::Consume);
    assert_eq!(history[0].cents, -120.5);
    assert_eq!(history[0].balance_after_cents, 379.5);

    // El asiento 'grant' del ledger se proyecta como 'add'.
    assert_eq!(history[1].entry_type, WalletEntryKind::Add);
    assert_eq!(history[1].cents, 500.0);
    assert_eq!(history[1].currency.as_deref(), Some("usd"));
}

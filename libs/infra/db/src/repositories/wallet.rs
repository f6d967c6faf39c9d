// [libs/infra/db/src/repositories/wallet.rs]
/*!
 * =================================================================
 * APARATO: WALLET MONETARY REPOSITORY (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: VISTA MONETARIA SOBRE EL LEDGER DE CRÉDITOS
 *
 * El monedero no posee tablas propias: persiste bajo la clave
 * reservada 'wallet' del mismo ledger, escalado a micro-centavos.
 * El ancla de divisa de la fila de balance custodia la coherencia.
 * =================================================================
 */

use crate::errors::LedgerError;
use crate::repositories::credits::CreditLedgerRepository;
use crate::LedgerClient;
use tesoro_domain_billing::format_cents;
use tesoro_domain_ledger::{
    cents_to_micro_cents, micro_cents_to_cents, ConsumeOutcome, DeltaMetadata, DeltaOutcome,
    HistoryFilter, TransactionType, WalletBalance, WalletEntry, WalletEntryKind,
    WALLET_RESERVED_KEY,
};
use tracing::instrument;

pub struct WalletRepository {
    credit_ledger: CreditLedgerRepository,
}

impl WalletRepository {
    pub fn new(client: LedgerClient) -> Self {
        Self { credit_ledger: CreditLedgerRepository::new(client) }
    }

    /// Acredita centavos (fraccionarios admitidos) al monedero.
    #[instrument(skip(self, metadata))]
    pub async fn add(
        &self,
        user_id: &str,
        cents: f64,
        currency: Option<&str>,
        metadata: &DeltaMetadata,
    ) -> Result<DeltaOutcome, LedgerError> {
        let micro_cents = cents_to_micro_cents(cents);
        let scoped_metadata = self.scope_metadata(metadata, currency);
        self.credit_ledger
            .grant(user_id, WALLET_RESERVED_KEY, micro_cents, &scoped_metadata)
            .await
    }

    /// Debita centavos del monedero; el saldo puede quedar negativo.
    #[instrument(skip(self, metadata))]
    pub async fn consume(
        &self,
        user_id: &str,
        cents: f64,
        currency: Option<&str>,
        metadata: &DeltaMetadata,
    ) -> Result<ConsumeOutcome, LedgerError> {
        let micro_cents = cents_to_micro_cents(cents);
        let scoped_metadata = self.scope_metadata(metadata, currency);
        self.credit_ledger
            .consume(user_id, WALLET_RESERVED_KEY, micro_cents, &scoped_metadata)
            .await
    }

    /// Saldo del monedero en unidades de pantalla; `None` si el usuario
    /// jamás tuvo fila de balance.
    pub async fn get_balance(&self, user_id: &str) -> Result<Option<WalletBalance>, LedgerError> {
        let balance_row = self.credit_ledger.find_balance_row(user_id, WALLET_RESERVED_KEY).await?;

        Ok(balance_row.map(|(micro_cents, currency)| {
            let cents = micro_cents_to_cents(micro_cents);
            let formatted = format_cents(cents, currency.as_deref().unwrap_or("usd"));
            WalletBalance { cents, currency, formatted }
        }))
    }

    /// Historial del monedero; los asientos `grant` del ledger se
    /// renderizan como `add` en esta superficie.
    pub async fn get_history(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WalletEntry>, LedgerError> {
        let filter = HistoryFilter {
            key: Some(WALLET_RESERVED_KEY.to_string()),
            limit,
            offset,
        };
        let ledger_history = self.credit_ledger.get_history(user_id, &filter).await?;

        Ok(ledger_history
            .into_iter()
            .map(|entry| WalletEntry {
                entry_type: match entry.transaction_type {
                    TransactionType::Grant => WalletEntryKind::Add,
                    TransactionType::Consume => WalletEntryKind::Consume,
                    TransactionType::Revoke => WalletEntryKind::Revoke,
                    TransactionType::Adjust => WalletEntryKind::Adjust,
                },
                cents: micro_cents_to_cents(entry.amount),
                balance_after_cents: micro_cents_to_cents(entry.balance_after),
                currency: entry.currency,
                description: entry.description,
                created_at: entry.created_at,
            })
            .collect())
    }

    fn scope_metadata(&self, metadata: &DeltaMetadata, currency: Option<&str>) -> DeltaMetadata {
        let mut scoped = metadata.clone();
        if scoped.source.is_none() {
            scoped.source = Some("wallet".to_string());
        }
        if let Some(currency_code) = currency {
            scoped.currency = Some(currency_code.to_ascii_lowercase());
        }
        scoped
    }
}

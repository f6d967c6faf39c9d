// [libs/infra/db/src/repositories/seats.rs]
/*!
 * =================================================================
 * APARATO: SEAT MEMBERSHIP REPOSITORY (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: FILAS DE ASIENTO Y UNICIDAD MULTI-SUSCRIPCIÓN
 *
 * Modelo de dos tablas: la pertenencia (user_id único -> subscription)
 * vive aquí; el mapa user -> customer vive en el espejo de Stripe.
 * =================================================================
 */

use crate::errors::LedgerError;
use crate::LedgerClient;
use libsql::params;
use tracing::{debug, instrument};

pub struct SeatRepository {
    database_client: LedgerClient,
    select_seat: String,
    insert_seat: String,
    delete_seat: String,
    list_seats: String,
}

impl SeatRepository {
    pub fn new(client: LedgerClient) -> Self {
        let ns = client.namespace();
        Self {
            select_seat: format!(
                "SELECT subscription_id FROM {ns}_seat_users WHERE user_id = ?1"
            ),
            insert_seat: format!(
                "INSERT INTO {ns}_seat_users (user_id, subscription_id) VALUES (?1, ?2)"
            ),
            delete_seat: format!("DELETE FROM {ns}_seat_users WHERE user_id = ?1"),
            list_seats: format!(
                "SELECT user_id FROM {ns}_seat_users
                 WHERE subscription_id = ?1
                 ORDER BY added_at ASC, user_id ASC"
            ),
            database_client: client,
        }
    }

    /// Suscripción a la que pertenece el asiento del usuario, si existe.
    pub async fn find_seat(&self, user_id: &str) -> Result<Option<String>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results =
            database_connection.query(&self.select_seat, params![user_id]).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(data_row.get(0)?)),
            None => Ok(None),
        }
    }

    /**
     * Sella la pertenencia del usuario a la suscripción.
     *
     * La unicidad de user_id en la tabla garantiza un asiento por
     * usuario; la colisión con otra suscripción emerge como
     * `SeatConflict` con el identificador ya poseído.
     */
    #[instrument(skip(self))]
    pub async fn insert_seat(
        &self,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<(), LedgerError> {
        if let Some(existing_subscription) = self.find_seat(user_id).await? {
            return Err(LedgerError::SeatConflict(existing_subscription));
        }

        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(&self.insert_seat, params![user_id, subscription_id])
            .await
            .map_err(|database_error| {
                if LedgerError::is_unique_violation(&database_error) {
                    LedgerError::SeatConflict(subscription_id.to_string())
                } else {
                    LedgerError::QueryError(database_error)
                }
            })?;

        debug!("🪑 [SEATS]: Seat sealed for {} on {}.", user_id, subscription_id);
        Ok(())
    }

    /// Libera el asiento; error si el usuario no lo ocupa.
    pub async fn remove_seat(&self, user_id: &str) -> Result<String, LedgerError> {
        let subscription_id = self.find_seat(user_id).await?.ok_or(LedgerError::SeatNotFound)?;

        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(&self.delete_seat, params![user_id]).await?;

        Ok(subscription_id)
    }

    /// Usuarios-asiento activos de una suscripción, en orden de alta.
    pub async fn list_seat_users(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<String>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results =
            database_connection.query(&self.list_seats, params![subscription_id]).await?;

        let mut seat_users = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            seat_users.push(data_row.get(0)?);
        }
        Ok(seat_users)
    }
}

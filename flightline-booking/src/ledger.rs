use flightline_core::PointsRepository;
use flightline_shared::ClientPoints;
use std::sync::Arc;
use tracing::debug;

use crate::error::{BookingError, BookingResult};

/// Per-client loyalty balances.
///
/// Credits and debits are computed here and written back as a single
/// overwrite, so the store never applies deltas itself. The ledger does not
/// enforce a non-negative balance; callers check `balance >= cost` before a
/// debit.
pub struct PointsLedger {
    points: Arc<dyn PointsRepository>,
}

impl PointsLedger {
    pub fn new(points: Arc<dyn PointsRepository>) -> Self {
        Self { points }
    }

    /// `None` when the client has never earned or spent points.
    pub async fn account(&self, client_id: &str) -> BookingResult<Option<ClientPoints>> {
        Ok(self.points.get_points(client_id).await?)
    }

    pub async fn balance(&self, client_id: &str) -> BookingResult<Option<f64>> {
        Ok(self.account(client_id).await?.map(|p| p.balance))
    }

    pub async fn require_balance(&self, client_id: &str) -> BookingResult<f64> {
        self.balance(client_id)
            .await?
            .ok_or_else(|| BookingError::PointsNotFound {
                client_id: client_id.to_string(),
            })
    }

    pub async fn set_balance(&self, client_id: &str, balance: f64) -> BookingResult<()> {
        self.points.upsert_points(client_id, balance).await?;
        Ok(())
    }

    /// Adds `amount` and returns the new balance.
    pub async fn credit(&self, client_id: &str, amount: f64) -> BookingResult<f64> {
        let current = self.balance(client_id).await?.unwrap_or(0.0);
        let updated = current + amount;
        self.set_balance(client_id, updated).await?;
        debug!("Credited {:.2} points to {} (balance {:.2})", amount, client_id, updated);
        Ok(updated)
    }

    /// Subtracts `amount` and returns the new balance.
    pub async fn debit(&self, client_id: &str, amount: f64) -> BookingResult<f64> {
        let current = self.balance(client_id).await?.unwrap_or(0.0);
        let updated = current - amount;
        self.set_balance(client_id, updated).await?;
        debug!("Debited {:.2} points from {} (balance {:.2})", amount, client_id, updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightline_store::InMemoryStore;

    fn ledger() -> PointsLedger {
        PointsLedger::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_credit_creates_record_lazily() {
        let ledger = ledger();
        assert_eq!(ledger.balance("a").await.unwrap(), None);

        assert_eq!(ledger.credit("a", 360.0).await.unwrap(), 360.0);
        assert_eq!(ledger.credit("a", 40.0).await.unwrap(), 400.0);
        assert_eq!(ledger.balance("a").await.unwrap(), Some(400.0));
    }

    #[tokio::test]
    async fn test_debit_does_not_guard_balance() {
        let ledger = ledger();
        ledger.set_balance("a", 100.0).await.unwrap();

        assert_eq!(ledger.debit("a", 60.0).await.unwrap(), 40.0);
        // Callers own the precondition.
        assert_eq!(ledger.debit("a", 50.0).await.unwrap(), -10.0);
    }

    #[tokio::test]
    async fn test_require_balance_reports_missing_record() {
        let ledger = ledger();
        let err = ledger.require_balance("ghost").await.unwrap_err();
        assert!(matches!(err, BookingError::PointsNotFound { .. }));
        assert_eq!(err.to_string(), "No points record found for this client");
    }
}

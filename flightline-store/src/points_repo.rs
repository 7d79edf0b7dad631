use async_trait::async_trait;
use flightline_core::{PointsRepository, RepoError};
use flightline_shared::ClientPoints;
use sqlx::PgPool;

pub struct PostgresPointsRepository {
    pool: PgPool,
}

impl PostgresPointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PointsRow {
    pub client_id: String,
    pub balance: f64,
}

impl From<PointsRow> for ClientPoints {
    fn from(row: PointsRow) -> Self {
        ClientPoints::new(row.client_id, row.balance)
    }
}

#[async_trait]
impl PointsRepository for PostgresPointsRepository {
    async fn get_points(&self, client_id: &str) -> Result<Option<ClientPoints>, RepoError> {
        let row = sqlx::query_as::<_, PointsRow>(
            "SELECT client_id, balance FROM client_points WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ClientPoints::from))
    }

    async fn upsert_points(&self, client_id: &str, balance: f64) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO client_points (client_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (client_id) DO UPDATE SET balance = EXCLUDED.balance
            "#,
        )
        .bind(client_id)
        .bind(balance)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

use async_trait::async_trait;
use flightline_core::{FlightRepository, RepoError};
use flightline_shared::Flight;
use sqlx::PgPool;

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FlightRow {
    pub id: i64,
    pub source: String,
    pub destination: String,
    pub departure_time: String,
    pub airfare: f64,
    pub seat_availability: i64,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            source: row.source,
            destination: row.destination,
            departure_time: row.departure_time,
            airfare: row.airfare,
            seat_availability: row.seat_availability,
        }
    }
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn find_flights_by_route(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<Flight>, RepoError> {
        let rows = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, source, destination, departure_time, airfare, seat_availability
            FROM flights
            WHERE source = $1 AND destination = $2
            ORDER BY id
            "#,
        )
        .bind(source)
        .bind(destination)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn get_flight(&self, id: i64) -> Result<Option<Flight>, RepoError> {
        let row = sqlx::query_as::<_, FlightRow>(
            r#"
            SELECT id, source, destination, departure_time, airfare, seat_availability
            FROM flights
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Flight::from))
    }

    async fn save_flight(&self, flight: &Flight) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO flights (id, source, destination, departure_time, airfare, seat_availability)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                source = EXCLUDED.source,
                destination = EXCLUDED.destination,
                departure_time = EXCLUDED.departure_time,
                airfare = EXCLUDED.airfare,
                seat_availability = EXCLUDED.seat_availability
            "#,
        )
        .bind(flight.id)
        .bind(&flight.source)
        .bind(&flight.destination)
        .bind(&flight.departure_time)
        .bind(flight.airfare)
        .bind(flight.seat_availability)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

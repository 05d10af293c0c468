use crate::error::AppError;
use crate::replay::types::{Observation, OptionSide};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// Read-only access to the observation series. All four operations are
/// side-effect-free and safe to retry; an exhausted traversal direction is
/// `Ok(None)`, never an error.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Smallest observed time `>= at_ms` for the series, if any.
    async fn resolve_at_or_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError>;

    /// Smallest observed time strictly after `at_ms`.
    async fn resolve_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError>;

    /// Largest observed time strictly before `at_ms`.
    async fn resolve_before(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError>;

    /// All legs at one exact, previously-resolved time. An arbitrary time
    /// legitimately returns an empty list.
    async fn fetch_observations(
        &self,
        symbol: &str,
        expiry: &str,
        time_ms: i64,
    ) -> Result<Vec<Observation>, AppError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTimeSeriesStore {
    pool: SqlitePool,
}

impl SqliteTimeSeriesStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_observation_row(row: &sqlx::sqlite::SqliteRow) -> Result<Observation, AppError> {
    let option_type_raw: String = row.try_get("option_type")?;

    Ok(Observation {
        symbol: row.try_get("symbol")?,
        expiry_date: row.try_get("expiry_date")?,
        time: row.try_get("time")?,
        strike_price: row.try_get("strike_price")?,
        option_type: OptionSide::parse_str(&option_type_raw)?,
        last_price: row.try_get("last_price")?,
        open_interest: row.try_get("open_interest")?,
        oi_change: row.try_get("oi_change")?,
        underlying_value: row.try_get("underlying_value")?,
    })
}

#[async_trait]
impl TimeSeriesStore for SqliteTimeSeriesStore {
    async fn resolve_at_or_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        let time = sqlx::query_scalar::<_, i64>(
            "SELECT time FROM observations WHERE symbol = ? AND expiry_date = ? AND time >= ? \
             ORDER BY time ASC LIMIT 1",
        )
        .bind(symbol)
        .bind(expiry)
        .bind(at_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(time)
    }

    async fn resolve_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        let time = sqlx::query_scalar::<_, i64>(
            "SELECT time FROM observations WHERE symbol = ? AND expiry_date = ? AND time > ? \
             ORDER BY time ASC LIMIT 1",
        )
        .bind(symbol)
        .bind(expiry)
        .bind(at_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(time)
    }

    async fn resolve_before(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        let time = sqlx::query_scalar::<_, i64>(
            "SELECT time FROM observations WHERE symbol = ? AND expiry_date = ? AND time < ? \
             ORDER BY time DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(expiry)
        .bind(at_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(time)
    }

    async fn fetch_observations(
        &self,
        symbol: &str,
        expiry: &str,
        time_ms: i64,
    ) -> Result<Vec<Observation>, AppError> {
        let rows = sqlx::query(
            "SELECT symbol, expiry_date, time, strike_price, option_type, last_price, \
             open_interest, oi_change, underlying_value \
             FROM observations \
             WHERE symbol = ? AND expiry_date = ? AND time = ? \
             ORDER BY strike_price ASC",
        )
        .bind(symbol)
        .bind(expiry)
        .bind(time_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(map_observation_row(&row)?);
        }

        Ok(observations)
    }
}

pub async fn available_symbols(pool: &SqlitePool) -> Result<Vec<String>, AppError> {
    let symbols =
        sqlx::query_scalar::<_, String>("SELECT DISTINCT symbol FROM observations ORDER BY symbol")
            .fetch_all(pool)
            .await?;

    Ok(symbols)
}

pub async fn available_expiries(pool: &SqlitePool, symbol: &str) -> Result<Vec<String>, AppError> {
    let expiries = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT expiry_date FROM observations WHERE symbol = ? ORDER BY expiry_date",
    )
    .bind(symbol)
    .fetch_all(pool)
    .await?;

    Ok(expiries)
}

pub async fn available_trade_dates(
    pool: &SqlitePool,
    symbol: &str,
    expiry: Option<&str>,
) -> Result<Vec<String>, AppError> {
    let dates = match expiry {
        Some(expiry) => {
            sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT date(time / 1000, 'unixepoch') FROM observations \
                 WHERE symbol = ? AND expiry_date = ? ORDER BY 1",
            )
            .bind(symbol)
            .bind(expiry)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT date(time / 1000, 'unixepoch') FROM observations \
                 WHERE symbol = ? ORDER BY 1",
            )
            .bind(symbol)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(dates)
}

/// In-memory series for engine and clock tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTimeSeriesStore {
    observations: Vec<Observation>,
}

#[cfg(test)]
impl MemoryTimeSeriesStore {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    fn series_times<'a>(
        &'a self,
        symbol: &'a str,
        expiry: &'a str,
    ) -> impl Iterator<Item = i64> + 'a {
        self.observations
            .iter()
            .filter(move |observation| {
                observation.symbol == symbol && observation.expiry_date == expiry
            })
            .map(|observation| observation.time)
    }
}

#[cfg(test)]
#[async_trait]
impl TimeSeriesStore for MemoryTimeSeriesStore {
    async fn resolve_at_or_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        Ok(self
            .series_times(symbol, expiry)
            .filter(|time| *time >= at_ms)
            .min())
    }

    async fn resolve_after(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        Ok(self
            .series_times(symbol, expiry)
            .filter(|time| *time > at_ms)
            .min())
    }

    async fn resolve_before(
        &self,
        symbol: &str,
        expiry: &str,
        at_ms: i64,
    ) -> Result<Option<i64>, AppError> {
        Ok(self
            .series_times(symbol, expiry)
            .filter(|time| *time < at_ms)
            .max())
    }

    async fn fetch_observations(
        &self,
        symbol: &str,
        expiry: &str,
        time_ms: i64,
    ) -> Result<Vec<Observation>, AppError> {
        Ok(self
            .observations
            .iter()
            .filter(|observation| {
                observation.symbol == symbol
                    && observation.expiry_date == expiry
                    && observation.time == time_ms
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) async fn insert_observation(
    pool: &SqlitePool,
    observation: &Observation,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO observations (symbol, expiry_date, time, strike_price, option_type, \
         last_price, open_interest, oi_change, underlying_value) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&observation.symbol)
    .bind(&observation.expiry_date)
    .bind(observation.time)
    .bind(observation.strike_price)
    .bind(observation.option_type.as_str())
    .bind(observation.last_price)
    .bind(observation.open_interest)
    .bind(observation.oi_change)
    .bind(observation.underlying_value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        crate::db::run_migrations(&pool)
            .await
            .expect("migrations should apply");

        for (time, strike, side) in [
            (1_000_i64, 18_000.0, OptionSide::Ce),
            (1_000, 18_000.0, OptionSide::Pe),
            (1_000, 18_050.0, OptionSide::Ce),
            (2_000, 18_000.0, OptionSide::Ce),
            (3_000, 18_000.0, OptionSide::Ce),
        ] {
            insert_observation(
                &pool,
                &Observation {
                    symbol: "NIFTY".to_string(),
                    expiry_date: "2025-05-29".to_string(),
                    time,
                    strike_price: strike,
                    option_type: side,
                    last_price: 5.0,
                    open_interest: 1_000,
                    oi_change: 10,
                    underlying_value: 18_020.0,
                },
            )
            .await
            .expect("seed row should insert");
        }

        insert_observation(
            &pool,
            &Observation {
                symbol: "BANKNIFTY".to_string(),
                expiry_date: "2025-06-26".to_string(),
                time: 1_500,
                strike_price: 44_000.0,
                option_type: OptionSide::Ce,
                last_price: 120.0,
                open_interest: 400,
                oi_change: -20,
                underlying_value: 44_150.0,
            },
        )
        .await
        .expect("seed row should insert");

        pool
    }

    #[tokio::test]
    async fn resolves_nearest_time_at_or_after_reference() {
        let pool = seeded_pool().await;
        let store = SqliteTimeSeriesStore::new(pool);

        let resolved = store
            .resolve_at_or_after("NIFTY", "2025-05-29", 1_000)
            .await
            .expect("query should succeed");
        assert_eq!(resolved, Some(1_000));

        let resolved = store
            .resolve_at_or_after("NIFTY", "2025-05-29", 1_001)
            .await
            .expect("query should succeed");
        assert_eq!(resolved, Some(2_000));
    }

    #[tokio::test]
    async fn resolve_after_and_before_are_strict() {
        let pool = seeded_pool().await;
        let store = SqliteTimeSeriesStore::new(pool);

        let next = store
            .resolve_after("NIFTY", "2025-05-29", 1_000)
            .await
            .expect("query should succeed");
        assert_eq!(next, Some(2_000));

        let prev = store
            .resolve_before("NIFTY", "2025-05-29", 2_000)
            .await
            .expect("query should succeed");
        assert_eq!(prev, Some(1_000));
    }

    #[tokio::test]
    async fn exhausted_directions_resolve_to_none() {
        let pool = seeded_pool().await;
        let store = SqliteTimeSeriesStore::new(pool);

        let past_end = store
            .resolve_after("NIFTY", "2025-05-29", 3_000)
            .await
            .expect("query should succeed");
        assert_eq!(past_end, None);

        let before_start = store
            .resolve_before("NIFTY", "2025-05-29", 1_000)
            .await
            .expect("query should succeed");
        assert_eq!(before_start, None);

        let unknown_series = store
            .resolve_at_or_after("NIFTY", "2099-01-01", 0)
            .await
            .expect("query should succeed");
        assert_eq!(unknown_series, None);
    }

    #[tokio::test]
    async fn fetches_all_legs_at_exact_time_ordered_by_strike() {
        let pool = seeded_pool().await;
        let store = SqliteTimeSeriesStore::new(pool);

        let observations = store
            .fetch_observations("NIFTY", "2025-05-29", 1_000)
            .await
            .expect("query should succeed");

        assert_eq!(observations.len(), 3);
        assert_eq!(observations[0].strike_price, 18_000.0);
        assert_eq!(observations[2].strike_price, 18_050.0);
        assert!(observations
            .windows(2)
            .all(|pair| pair[0].strike_price <= pair[1].strike_price));
    }

    #[tokio::test]
    async fn fetch_at_unobserved_time_is_empty_not_an_error() {
        let pool = seeded_pool().await;
        let store = SqliteTimeSeriesStore::new(pool);

        let observations = store
            .fetch_observations("NIFTY", "2025-05-29", 1_234)
            .await
            .expect("query should succeed");
        assert!(observations.is_empty());
    }

    #[tokio::test]
    async fn lists_symbols_expiries_and_trade_dates() {
        let pool = seeded_pool().await;

        let symbols = available_symbols(&pool).await.expect("query should succeed");
        assert_eq!(symbols, vec!["BANKNIFTY".to_string(), "NIFTY".to_string()]);

        let expiries = available_expiries(&pool, "NIFTY")
            .await
            .expect("query should succeed");
        assert_eq!(expiries, vec!["2025-05-29".to_string()]);

        let dates = available_trade_dates(&pool, "NIFTY", Some("2025-05-29"))
            .await
            .expect("query should succeed");
        assert_eq!(dates, vec!["1970-01-01".to_string()]);

        let dates = available_trade_dates(&pool, "BANKNIFTY", None)
            .await
            .expect("query should succeed");
        assert_eq!(dates.len(), 1);
    }
}

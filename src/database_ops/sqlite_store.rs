use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqlitePool,
};
use tracing::info;

use super::{
    checked_table, PersistenceError, PriceFilter, PriceStore, COLUMNS, KEY_COLUMNS,
    UPDATE_NON_KEY,
};
use crate::normalization::PriceRecord;

/// SQLite-backed price store for local runs and tests.
#[derive(Clone)]
pub struct SqliteStore {
    pub pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        table: &str,
    ) -> Result<Self, PersistenceError> {
        let table = checked_table(table)?;
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));
        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if database_url.contains(":memory:") {
            // Every connection to `:memory:` is its own database; pin exactly one.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        info!("connected to sqlite");
        Ok(Self { pool, table })
    }

    /// Fresh private in-memory database.
    pub async fn in_memory(table: &str) -> Result<Self, PersistenceError> {
        Self::connect("sqlite::memory:", 1, table).await
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn ensure_unique_index(&self) -> Result<(), PersistenceError> {
        let t = &self.table;
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                region TEXT NOT NULL,
                market TEXT NOT NULL,
                commodity TEXT NOT NULL,
                min_price TEXT NOT NULL,
                modal_price TEXT NOT NULL,
                max_price TEXT NOT NULL,
                arrival_volume TEXT NOT NULL,
                traded_volume TEXT NOT NULL,
                unit TEXT NOT NULL,
                date TEXT NOT NULL,
                source_name TEXT NOT NULL,
                captured_at TEXT NOT NULL
            )"
        );
        sqlx::raw_sql(&create_table).execute(&self.pool).await?;
        let create_index =
            format!("CREATE UNIQUE INDEX IF NOT EXISTS {t}_key_uidx ON {t} ({KEY_COLUMNS})");
        sqlx::raw_sql(&create_index).execute(&self.pool).await?;
        info!(table = %t, "unique key index ensured");
        Ok(())
    }

    async fn upsert(&self, r: &PriceRecord) -> Result<(), PersistenceError> {
        let sql = format!(
            "INSERT INTO {} ({COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT ({KEY_COLUMNS}) DO UPDATE SET {UPDATE_NON_KEY}",
            self.table
        );
        sqlx::query(&sql)
            .bind(&r.region)
            .bind(&r.market)
            .bind(&r.commodity)
            .bind(&r.min_price)
            .bind(&r.modal_price)
            .bind(&r.max_price)
            .bind(&r.arrival_volume)
            .bind(&r.traded_volume)
            .bind(&r.unit)
            .bind(&r.date)
            .bind(&r.source_name)
            .bind(r.captured_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, filter: &PriceFilter) -> Result<Vec<PriceRecord>, PersistenceError> {
        let filter = filter.normalized();
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM {} WHERE 1 = 1",
            self.table
        ));
        if let Some(region) = filter.region {
            qb.push(" AND region = ").push_bind(region);
        }
        if let Some(market) = filter.market {
            qb.push(" AND market = ").push_bind(market);
        }
        if let Some(commodity) = filter.commodity {
            qb.push(" AND instr(commodity, ").push_bind(commodity).push(") > 0");
        }
        qb.push(" ORDER BY region, market, commodity, date");
        let rows = qb
            .build_query_as::<PriceRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn distinct_regions(&self) -> Result<Vec<String>, PersistenceError> {
        let sql = format!("SELECT DISTINCT region FROM {} ORDER BY region", self.table);
        let regions: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(regions)
    }

    async fn distinct_markets(&self, region: &str) -> Result<Vec<String>, PersistenceError> {
        let sql = format!(
            "SELECT DISTINCT market FROM {} WHERE region = ? ORDER BY market",
            self.table
        );
        let markets: Vec<String> = sqlx::query_scalar(&sql)
            .bind(region.trim().to_uppercase())
            .fetch_all(&self.pool)
            .await?;
        Ok(markets)
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

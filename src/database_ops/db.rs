use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Postgres, QueryBuilder,
};
use tracing::{info, instrument};

use super::{
    checked_table, PersistenceError, PriceFilter, PriceStore, COLUMNS, KEY_COLUMNS,
    UPDATE_NON_KEY,
};
use crate::normalization::PriceRecord;

/// Postgres-backed price store.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
    table: String,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        table: &str,
    ) -> Result<Self, PersistenceError> {
        let table = checked_table(table)?;
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }
        // PgBouncer txn mode safe
        connect_options = connect_options.statement_cache_capacity(0);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl PriceStore for Db {
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
                captured_at TIMESTAMPTZ NOT NULL
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT ({KEY_COLUMNS}) DO UPDATE SET {UPDATE_NON_KEY}",
            self.table
        );
        sqlx::query(&sql)
            .persistent(false)
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
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM {} WHERE TRUE",
            self.table
        ));
        if let Some(region) = filter.region {
            qb.push(" AND region = ").push_bind(region);
        }
        if let Some(market) = filter.market {
            qb.push(" AND market = ").push_bind(market);
        }
        if let Some(commodity) = filter.commodity {
            // strpos keeps '%' and '_' literal, unlike LIKE.
            qb.push(" AND strpos(commodity, ").push_bind(commodity).push(") > 0");
        }
        qb.push(" ORDER BY region, market, commodity, date");
        let rows = qb
            .build_query_as::<PriceRecord>()
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn distinct_regions(&self) -> Result<Vec<String>, PersistenceError> {
        let sql = format!(
            "SELECT DISTINCT region FROM {} ORDER BY region",
            self.table
        );
        let regions: Vec<String> = sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        Ok(regions)
    }

    async fn distinct_markets(&self, region: &str) -> Result<Vec<String>, PersistenceError> {
        let sql = format!(
            "SELECT DISTINCT market FROM {} WHERE region = $1 ORDER BY market",
            self.table
        );
        let markets: Vec<String> = sqlx::query_scalar(&sql)
            .persistent(false)
            .bind(region.trim().to_uppercase())
            .fetch_all(&self.pool)
            .await?;
        Ok(markets)
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .persistent(false)
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

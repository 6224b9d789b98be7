//! PostgreSQL source: connection manager plus the extractor queries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinesync_types::config::{BackoffPolicy, PostgresConfig};
use cinesync_types::{FilmworkRow, GenreRow, ModifiedRow, PersonRow};
use pg_escape::quote_identifier;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls, Row};
use uuid::Uuid;

use super::{SourceError, SourceStore, SourceTable};
use crate::errors::PipelineError;
use crate::retry::connect_with_backoff;

/// Open connection to the movies database.
///
/// The driver's connection future runs on a spawned task; [`close`] drops
/// the client and waits for that task to finish.
///
/// [`close`]: SourceStore::close
pub struct PgSource {
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    schema: String,
}

impl PgSource {
    /// Connect once, without retries.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Postgres`] if the connection fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, SourceError> {
        let mut pg = PgConfig::new();
        pg.host(&config.host);
        pg.port(config.port);
        pg.user(&config.user);
        if !config.password.is_empty() {
            pg.password(&config.password);
        }
        pg.dbname(&config.database);
        pg.connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        let (client, connection) = pg.connect(NoTls).await?;
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to PostgreSQL"
        );

        Ok(Self {
            client: Some(client),
            connection: Some(handle),
            schema: config.schema.clone(),
        })
    }

    /// Connect, retrying transient failures per `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Connect`] when every attempt failed.
    pub async fn connect_with_retry(
        config: &PostgresConfig,
        policy: &BackoffPolicy,
    ) -> Result<Self, PipelineError> {
        connect_with_backoff("postgres", policy, || Self::connect(config)).await
    }

    /// Run `SELECT 1`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the query fails or the source is closed.
    pub async fn ping(&self) -> Result<(), SourceError> {
        self.query("SELECT 1", &[]).await.map(drop)
    }

    /// Execute `sql` with bind parameters and return every row.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Closed`] after [`SourceStore::close`], or the
    /// driver error.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, SourceError> {
        let client = self.client.as_ref().ok_or(SourceError::Closed)?;
        Ok(client.query(sql, params).await?)
    }

    async fn query_since(
        &self,
        sql: &SinceQuery,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>, SourceError> {
        match since {
            Some(ts) => self.query(&sql.bounded, &[&ts]).await,
            None => self.query(&sql.unbounded, &[]).await,
        }
    }
}

/// A "changed since" query with and without its lower bound.
struct SinceQuery {
    bounded: String,
    unbounded: String,
}

impl SinceQuery {
    fn new(select: &str) -> Self {
        Self {
            bounded: format!("{select} WHERE modified > $1 ORDER BY modified"),
            unbounded: format!("{select} ORDER BY modified"),
        }
    }
}

fn table(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

fn modified_query(schema: &str, source: SourceTable) -> SinceQuery {
    SinceQuery::new(&format!(
        "SELECT id, modified FROM {}",
        table(schema, source.as_str())
    ))
}

fn persons_query(schema: &str) -> SinceQuery {
    SinceQuery::new(&format!(
        "SELECT id, full_name, modified FROM {}",
        table(schema, "person")
    ))
}

fn genres_query(schema: &str) -> SinceQuery {
    SinceQuery::new(&format!(
        "SELECT id, name, description, modified FROM {}",
        table(schema, "genre")
    ))
}

fn film_ids_by_link_query(schema: &str, link_table: &str, link_column: &str) -> String {
    format!(
        "SELECT fw.id, fw.modified \
         FROM {fw} fw \
         JOIN {link} l ON l.film_work_id = fw.id \
         WHERE l.{col} = ANY($1) \
         GROUP BY fw.id, fw.modified \
         ORDER BY fw.modified",
        fw = table(schema, "film_work"),
        link = table(schema, link_table),
        col = quote_identifier(link_column),
    )
}

fn films_by_ids_query(schema: &str) -> String {
    format!(
        "SELECT fw.id AS fw_id, fw.title, fw.description, fw.rating, fw.modified, \
                g.id AS genre_id, g.name AS genre, \
                p.id AS person_id, p.full_name, pfw.role \
         FROM {fw} fw \
         LEFT JOIN {gfw} gfw ON gfw.film_work_id = fw.id \
         LEFT JOIN {g} g ON g.id = gfw.genre_id \
         LEFT JOIN {pfw} pfw ON pfw.film_work_id = fw.id \
         LEFT JOIN {p} p ON p.id = pfw.person_id \
         WHERE fw.id = ANY($1) \
         ORDER BY fw.modified, fw.id",
        fw = table(schema, "film_work"),
        gfw = table(schema, "genre_film_work"),
        g = table(schema, "genre"),
        pfw = table(schema, "person_film_work"),
        p = table(schema, "person"),
    )
}

fn film_row(row: &Row) -> Result<FilmworkRow, SourceError> {
    Ok(FilmworkRow {
        fw_id: row.try_get("fw_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        rating: row.try_get("rating")?,
        modified: row.try_get("modified")?,
        genre_id: row.try_get("genre_id")?,
        genre: row.try_get("genre")?,
        person_id: row.try_get("person_id")?,
        full_name: row.try_get("full_name")?,
        role: row.try_get("role")?,
    })
}

fn ids(rows: &[Row]) -> Result<Vec<Uuid>, SourceError> {
    rows.iter()
        .map(|r| r.try_get::<_, Uuid>("id").map_err(SourceError::from))
        .collect()
}

#[async_trait]
impl SourceStore for PgSource {
    async fn modified_since(
        &self,
        source: SourceTable,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ModifiedRow>, SourceError> {
        let rows = self
            .query_since(&modified_query(&self.schema, source), since)
            .await?;
        rows.iter()
            .map(|r| {
                Ok(ModifiedRow {
                    id: r.try_get("id")?,
                    modified: r.try_get("modified")?,
                })
            })
            .collect()
    }

    async fn film_ids_by_genres(&self, genre_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        let sql = film_ids_by_link_query(&self.schema, "genre_film_work", "genre_id");
        ids(&self.query(&sql, &[&genre_ids]).await?)
    }

    async fn film_ids_by_persons(&self, person_ids: &[Uuid]) -> Result<Vec<Uuid>, SourceError> {
        let sql = film_ids_by_link_query(&self.schema, "person_film_work", "person_id");
        ids(&self.query(&sql, &[&person_ids]).await?)
    }

    async fn films_by_ids(&self, film_ids: &[Uuid]) -> Result<Vec<FilmworkRow>, SourceError> {
        let sql = films_by_ids_query(&self.schema);
        let rows = self.query(&sql, &[&film_ids]).await?;
        rows.iter().map(film_row).collect()
    }

    async fn persons_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PersonRow>, SourceError> {
        let rows = self.query_since(&persons_query(&self.schema), since).await?;
        rows.iter()
            .map(|r| {
                Ok(PersonRow {
                    id: r.try_get("id")?,
                    full_name: r.try_get("full_name")?,
                    modified: r.try_get("modified")?,
                })
            })
            .collect()
    }

    async fn genres_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GenreRow>, SourceError> {
        let rows = self.query_since(&genres_query(&self.schema), since).await?;
        rows.iter()
            .map(|r| {
                Ok(GenreRow {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    description: r.try_get("description")?,
                    modified: r.try_get("modified")?,
                })
            })
            .collect()
    }

    async fn close(&mut self) {
        let was_open = self.client.take().is_some();
        if let Some(handle) = self.connection.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "PostgreSQL connection task ended abnormally");
            }
        }
        if was_open {
            tracing::info!("Connection to PostgreSQL closed");
        }
    }
}

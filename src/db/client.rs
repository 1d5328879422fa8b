// orderlog-watcher - db/client.rs
//
// `DbEngine`: a small synchronous facade around one `tiberius` (Tiberius
// is the standard async Tokio-based Microsoft SQL Server driver) client,
// driven by a dedicated current-thread Tokio runtime so call sites in the
// consumer/emitter threads stay ordinary blocking calls (§5 models the
// service as a thread-per-worker system, not an async-task system).
//
// Connection lifecycle is an explicit scoped resource - `open`/`close` -
// rather than hidden behind a per-call decorator (see the redesign note
// in spec §9). `open` retries with backoff per §4.F/§7; once retries are
// exhausted the engine is flagged `Errored` and the very next call
// short-circuits rather than retrying again immediately.

use std::time::Duration;

use tiberius::{AuthMethod, Client, Config, Row};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::util::constants::{DB_CONNECT_MAX_RETRIES, DB_CONNECT_RETRY_DELAY_SECS};
use crate::util::error::AuditError;

/// Connection parameters for one logical database endpoint (audit store
/// or operational store). Mirrors the original service's single
/// `CONNECTION[...]` dict entry per source.
#[derive(Debug, Clone)]
pub struct DbConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DbConnectionInfo {
    /// Reads `{PREFIX}_HOST`/`_PORT`/`_DATABASE`/`_USER`/`_PASSWORD` from
    /// the environment. Connection credentials are deliberately kept out
    /// of the `key::value` source config (§6) - that file identifies a
    /// watched source, not a database login - mirroring the original
    /// service's separate `CONNECTION` dict.
    pub fn from_env(prefix: &str) -> Result<Self, AuditError> {
        let var = |suffix: &str| -> Result<String, AuditError> {
            let name = format!("{prefix}_{suffix}");
            std::env::var(&name).map_err(|_| AuditError::Connect {
                endpoint: prefix.to_string(),
                attempts: 0,
                reason: format!("environment variable {name} is not set"),
            })
        };
        let port = var("PORT")?.parse::<u16>().map_err(|e| AuditError::Connect {
            endpoint: prefix.to_string(),
            attempts: 0,
            reason: format!("invalid port: {e}"),
        })?;
        Ok(DbConnectionInfo {
            host: var("HOST")?,
            port,
            database: var("DATABASE")?,
            user: var("USER")?,
            password: var("PASSWORD")?,
        })
    }
}

/// Whether the engine's next call can reuse the existing connection.
/// Replaces the original's mutable "reopen on next call" sentinel flag
/// with an explicit, inspectable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbHealth {
    Healthy,
    Errored,
}

type TdsClient = Client<Compat<TcpStream>>;

/// Owns one `tiberius` connection plus the runtime needed to drive it.
/// Not `Send`-shared: each logical engine (audit, operational) is
/// single-threaded, matching §5's "each logical `engine` is
/// single-threaded; reopened under its own lock when `engine_error` is
/// observed" - the "lock" here is simply exclusive ownership by the one
/// thread that holds the `DbEngine`.
pub struct DbEngine {
    info: DbConnectionInfo,
    endpoint_name: &'static str,
    rt: Runtime,
    client: Option<TdsClient>,
    health: DbHealth,
}

impl DbEngine {
    pub fn new(info: DbConnectionInfo, endpoint_name: &'static str) -> Self {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build current-thread tokio runtime for DbEngine");
        DbEngine {
            info,
            endpoint_name,
            rt,
            client: None,
            health: DbHealth::Healthy,
        }
    }

    pub fn health(&self) -> DbHealth {
        self.health
    }

    /// Opens the connection if not already open and healthy, retrying
    /// `DB_CONNECT_MAX_RETRIES` times with a fixed backoff. On exhausted
    /// retries the engine is flagged `Errored` and an `AuditError::Connect`
    /// is returned; the caller (consumer/emitter) records the condition
    /// and continues rather than treating it as fatal.
    pub fn open(&mut self) -> Result<(), AuditError> {
        if self.client.is_some() && self.health == DbHealth::Healthy {
            return Ok(());
        }

        let mut last_reason = String::new();
        for attempt in 1..=DB_CONNECT_MAX_RETRIES {
            match self.connect_once() {
                Ok(client) => {
                    self.client = Some(client);
                    self.health = DbHealth::Healthy;
                    return Ok(());
                }
                Err(reason) => {
                    tracing::warn!(
                        endpoint = self.endpoint_name,
                        attempt,
                        error = %reason,
                        "database connect attempt failed"
                    );
                    last_reason = reason;
                    if attempt < DB_CONNECT_MAX_RETRIES {
                        std::thread::sleep(Duration::from_secs(DB_CONNECT_RETRY_DELAY_SECS));
                    }
                }
            }
        }

        self.health = DbHealth::Errored;
        Err(AuditError::Connect {
            endpoint: self.endpoint_name.to_string(),
            attempts: DB_CONNECT_MAX_RETRIES,
            reason: last_reason,
        })
    }

    fn connect_once(&self) -> Result<TdsClient, String> {
        self.rt.block_on(async {
            let mut config = Config::new();
            config.host(&self.info.host);
            config.port(self.info.port);
            config.database(&self.info.database);
            config.authentication(AuthMethod::sql_server(&self.info.user, &self.info.password));
            config.trust_cert();

            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| e.to_string())?;
            tcp.set_nodelay(true).map_err(|e| e.to_string())?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| e.to_string())
        })
    }

    /// Releases the connection. Called by the supervisor on shutdown and
    /// by `mark_errored` below.
    pub fn close(&mut self) {
        self.client = None;
    }

    /// Forces the next `open()` to reconnect; the consumer calls this
    /// when `registerMessage` returns `MessageStatus::Null` (§4.E).
    pub fn mark_errored(&mut self) {
        self.health = DbHealth::Errored;
        self.client = None;
    }

    /// Runs `sql` with `params`, wrapped in its own transaction
    /// (rolled back on any failure per §4.F), and returns at most one
    /// row. `procedure` is the logical call-site name used only for
    /// diagnostics - the call shape is a plain parameterized `EXEC` or
    /// stored-procedure-call string, never raw SQL assembled from
    /// untrusted input.
    pub fn query_one(
        &mut self,
        procedure: &'static str,
        sql: &str,
        params: &[&dyn tiberius::ToSql],
    ) -> Result<Option<Row>, AuditError> {
        self.open()?;
        let client = self.client.as_mut().expect("opened above");
        let rt = &self.rt;

        let outcome = rt.block_on(async {
            client
                .simple_query("BEGIN TRANSACTION")
                .await?
                .into_results()
                .await?;

            match client.query(sql, params).await {
                Ok(stream) => match stream.into_first_result().await {
                    Ok(rows) => {
                        client
                            .simple_query("COMMIT TRANSACTION")
                            .await?
                            .into_results()
                            .await?;
                        Ok(rows.into_iter().next())
                    }
                    Err(e) => {
                        let _ = client.simple_query("ROLLBACK TRANSACTION").await;
                        Err(e)
                    }
                },
                Err(e) => {
                    let _ = client.simple_query("ROLLBACK TRANSACTION").await;
                    Err(e)
                }
            }
        });

        outcome.map_err(|e: tiberius::error::Error| {
            self.health = DbHealth::Errored;
            AuditError::Call {
                procedure,
                reason: e.to_string(),
            }
        })
    }

    /// Like `query_one` but for calls expected to return more than one
    /// row (the operational store's `orders`/`batches` views).
    pub fn query_many(
        &mut self,
        procedure: &'static str,
        sql: &str,
        params: &[&dyn tiberius::ToSql],
    ) -> Result<Vec<Row>, AuditError> {
        self.open()?;
        let client = self.client.as_mut().expect("opened above");
        let rt = &self.rt;

        let outcome = rt.block_on(async { client.query(sql, params).await?.into_first_result().await });

        outcome.map_err(|e: tiberius::error::Error| {
            self.health = DbHealth::Errored;
            AuditError::Call {
                procedure,
                reason: e.to_string(),
            }
        })
    }
}

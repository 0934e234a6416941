//! PostgreSQL target: pooled DDL connections and dedicated bulk COPY
//! sessions.
//!
//! DDL and catalog queries run through a deadpool-managed pool. Each data
//! worker additionally opens one dedicated connection for `COPY FROM
//! STDIN`, with `synchronous_commit` switched off for the whole session so
//! WAL flushes do not pace the load.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::SinkExt;
use rustls::ClientConfig;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::{qualify, quote_ident};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target connection handle.
pub struct PgTarget {
    pool: Pool,
    pg_config: PgConfig,
    ssl_mode: String,
}

impl PgTarget {
    /// Connect to the destination database.
    pub async fn connect(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = config.ssl_mode.to_lowercase();
        let pool = match ssl_mode.as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr =
                    Manager::from_config(pg_config.clone(), tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| MigrateError::pool(e.to_string(), "creating PostgreSQL pool"))?
            }
            mode => {
                let tls_config = build_tls_config(mode)?;
                let tls = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config.clone(), tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| MigrateError::pool(e.to_string(), "creating PostgreSQL pool"))?
            }
        };

        let client = pool.get().await.map_err(|e| {
            MigrateError::connect(e.to_string(), "testing PostgreSQL target connection")
        })?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            pg_config,
            ssl_mode,
        })
    }

    /// Execute a single statement on a pooled connection.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "getting PostgreSQL connection"))?;
        Ok(client.execute(sql, &[]).await?)
    }

    /// All schema names present in the destination cluster.
    pub async fn schema_names(&self) -> Result<Vec<String>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "getting PostgreSQL connection"))?;
        let rows = client
            .query("SELECT schema_name FROM information_schema.schemata", &[])
            .await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Whether a schema exists.
    pub async fn schema_exists(&self, schema: &str) -> Result<bool> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "getting PostgreSQL connection"))?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
                &[&schema],
            )
            .await?;
        Ok(row.get::<_, bool>(0))
    }

    /// Create the destination schema. Failure here is fatal.
    pub async fn create_schema(&self, schema: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA {}", quote_ident(schema));
        self.execute(&sql).await.map_err(|e| MigrateError::Schema {
            sql,
            message: e.to_string(),
        })?;
        debug!("Created schema '{}'", schema);
        Ok(())
    }

    /// Open a dedicated bulk-COPY connection with synchronous commit off.
    pub async fn bulk_session(&self) -> Result<BulkSession> {
        let client = match self.ssl_mode.as_str() {
            "disable" => {
                let (client, connection) = self
                    .pg_config
                    .connect(tokio_postgres::NoTls)
                    .await
                    .map_err(|e| {
                        MigrateError::connect(e.to_string(), "opening bulk COPY connection")
                    })?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("bulk connection closed: {}", e);
                    }
                });
                client
            }
            mode => {
                let tls = MakeRustlsConnect::new(build_tls_config(mode)?);
                let (client, connection) = self.pg_config.connect(tls).await.map_err(|e| {
                    MigrateError::connect(e.to_string(), "opening bulk COPY connection")
                })?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("bulk connection closed: {}", e);
                    }
                });
                client
            }
        };

        client
            .batch_execute("SET synchronous_commit = off")
            .await?;

        Ok(BulkSession { client })
    }
}

/// One dedicated connection running `COPY FROM STDIN` in text format.
pub struct BulkSession {
    client: tokio_postgres::Client,
}

impl BulkSession {
    /// Send pre-encoded COPY text lines into a table. Returns the number of
    /// rows the server accepted.
    pub async fn copy(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        data: String,
    ) -> Result<u64> {
        let col_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "COPY {} ({}) FROM STDIN",
            qualify(schema, table),
            col_list
        );

        let sink = self.client.copy_in(&sql).await?;
        tokio::pin!(sink);
        sink.send(Bytes::from(data)).await?;
        let rows = sink.finish().await?;
        Ok(rows)
    }
}

/// Build a rustls client configuration for the given ssl_mode.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!("ssl_mode=require: TLS enabled but server certificate is not verified.");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(MigrateError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Accept-all certificate verifier used for ssl_mode=require.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_config_modes() {
        assert!(build_tls_config("require").is_ok());
        assert!(build_tls_config("verify-ca").is_ok());
        assert!(build_tls_config("verify-full").is_ok());
        assert!(matches!(
            build_tls_config("sometimes"),
            Err(MigrateError::Config(_))
        ));
    }
}

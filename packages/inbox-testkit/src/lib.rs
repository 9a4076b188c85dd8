//! Disposable Postgres databases and record fixtures for store-backed tests.
//!
//! Every [`TestDatabase`] is a fresh database created next to the one named by [`ENV_PG_DSN`] and
//! dropped when the test finishes, even if it panics.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, PgPool,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const ENV_PG_DSN: &str = "INBOX_PG_DSN";

const DATABASE_PREFIX: &str = "inbox_test_";
/// Tried in order when looking for a database to issue CREATE/DROP from.
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("{ENV_PG_DSN} is not a valid DSN: {err}.")))?;
		let (maintenance, mut conn) = maintenance_connection(&base).await?;
		let name = format!("{DATABASE_PREFIX}{}", Uuid::new_v4().simple());

		sqlx::raw_sql(&format!(r#"CREATE DATABASE "{name}""#))
			.execute(&mut conn)
			.await
			.map_err(|err| Error::Message(format!("Could not create {name}: {err}.")))?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Drops the database now and reports failures, instead of best effort on drop.
	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.maintenance).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = std::mem::take(&mut self.name);
		let maintenance = self.maintenance.clone();

		// Drop may run inside a runtime, so the cleanup gets its own thread and runtime.
		let handle = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&name, &maintenance)));

			if let Err(err) = result {
				eprintln!("Leaked test database {name}: {err}");
			}
		});

		let _ = handle.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(ENV_PG_DSN).ok().filter(|dsn| !dsn.trim().is_empty())
}

/// Inserts a tenant with default alert and rating settings.
pub async fn seed_tenant(pool: &PgPool, name: &str) -> Result<Uuid> {
	let id = sqlx::query_scalar("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
		.bind(name)
		.fetch_one(pool)
		.await?;

	Ok(id)
}

/// Binds a provider phone number id to `tenant_id`.
pub async fn seed_channel(pool: &PgPool, tenant_id: Uuid, phone_number_id: &str) -> Result<Uuid> {
	let id = sqlx::query_scalar(
		"INSERT INTO whatsapp_accounts (tenant_id, phone_number_id) VALUES ($1, $2) RETURNING id",
	)
	.bind(tenant_id)
	.bind(phone_number_id)
	.fetch_one(pool)
	.await?;

	Ok(id)
}

async fn maintenance_connection(
	base: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut errors = Vec::new();

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => errors.push(format!("{database}: {err}")),
		}
	}

	Err(Error::Message(format!("No maintenance database reachable ({}).", errors.join("; "))))
}

async fn drop_database(name: &str, maintenance: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	// Pools from the test may still hold connections.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1
	AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await?;
	sqlx::raw_sql(&format!(r#"DROP DATABASE IF EXISTS "{name}""#)).execute(&mut conn).await?;

	Ok(())
}

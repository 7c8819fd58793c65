// Copyright 2017-2021 Parity Technologies (UK) Ltd.
// This file is part of substrate-archive.

// substrate-archive is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// substrate-archive is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with substrate-archive.  If not, see <http://www.gnu.org/licenses/>.

//! Persistent store (§4.A): a Postgres-backed stand-in for the key/value store with strong
//! per-entity-group transactions, keyed by game.

pub mod keys;
pub mod models;
pub mod queries;

use std::{fmt, time::Duration};

use serde::Deserialize;
use sqlx::{
	pool::PoolConnection,
	postgres::{PgConnection, PgPool, PgPoolOptions, Postgres},
	Connection, Transaction,
};

use crate::config::ControlConfig;
use crate::error::Result;

/// Run all migrations against `url`.
pub async fn migrate<T: AsRef<str>>(url: T) -> Result<()> {
	let mut conn = PgConnection::connect(url.as_ref()).await?;
	sqlx::migrate!("./migrations/").run(&mut conn).await?;
	Ok(())
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatabaseConfig {
	pub url: String,
}

impl fmt::Display for DatabaseConfig {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.url)
	}
}

#[derive(Clone)]
pub struct Store {
	pool: PgPool,
	url: String,
}

impl Store {
	pub async fn new(url: String, control: &ControlConfig) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.min_connections(control.db_pool_min)
			.max_connections(control.db_pool_max)
			.idle_timeout(Duration::from_secs(600))
			.connect(url.as_str())
			.await?;
		Ok(Self { pool, url })
	}

	pub fn with_pool(url: String, pool: PgPool) -> Self {
		Self { pool, url }
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	pub async fn conn(&self) -> Result<PoolConnection<Postgres>> {
		self.pool.acquire().await.map_err(Into::into)
	}

	/// Opens the single cross-group transaction a game's entity group is mutated within (§5).
	pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
		self.pool.begin().await.map_err(Into::into)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn database_config_display_is_the_url() {
		let cfg = DatabaseConfig { url: "postgres://localhost/turnresolve".into() };
		assert_eq!(cfg.to_string(), "postgres://localhost/turnresolve");
	}
}

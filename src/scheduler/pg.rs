// Copyright 2018-2021 Parity Technologies (UK) Ltd.
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

//! A Postgres-table-backed runner: claims due rows with `SELECT ... FOR UPDATE SKIP LOCKED`
//! so concurrent runners never double-pick a job, then dispatches through a [`Registry`].

use std::sync::Arc;
use std::time::Duration;

use sqlx::Row;

use crate::config::ControlConfig;
use crate::error::Result;
use crate::scheduler::{BackgroundJob, Job, Registry};
use crate::store::Store;

pub struct Builder<Env> {
	environment: Env,
	store: Store,
	registry: Registry<Env>,
	poll_interval: Duration,
	max_in_flight: usize,
}

impl<Env: 'static + Send + Sync> Builder<Env> {
	pub fn new(environment: Env, store: Store) -> Self {
		Self { environment, store, registry: Registry::new(), poll_interval: Duration::from_millis(500), max_in_flight: 1 }
	}

	pub fn register_job<T: Job<Environment = Env> + 'static>(mut self) -> Self {
		self.registry = self.registry.register::<T>();
		self
	}

	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	pub fn max_in_flight(mut self, n: usize) -> Self {
		self.max_in_flight = n;
		self
	}

	pub fn control_config(mut self, control: &ControlConfig) -> Self {
		self.poll_interval = Duration::from_millis(control.scheduler_poll_interval_ms);
		self.max_in_flight = control.scheduler_max_in_flight_jobs;
		self
	}

	pub fn build(self) -> PgScheduler<Env> {
		PgScheduler {
			environment: Arc::new(self.environment),
			store: self.store,
			registry: Arc::new(self.registry),
			poll_interval: self.poll_interval,
			max_in_flight: self.max_in_flight,
			worker_id: format!("worker-{}", std::process::id()),
		}
	}
}

/// Runner for the durable job queue.
pub struct PgScheduler<Env> {
	environment: Arc<Env>,
	store: Store,
	registry: Arc<Registry<Env>>,
	poll_interval: Duration,
	max_in_flight: usize,
	worker_id: String,
}

#[derive(sqlx::FromRow)]
struct ClaimedRow {
	id: i64,
	job_type: String,
	payload: serde_json::Value,
	attempts: i32,
}

impl<Env: 'static + Send + Sync> PgScheduler<Env> {
	pub fn builder(environment: Env, store: Store) -> Builder<Env> {
		Builder::new(environment, store)
	}

	/// Polls forever, running up to `max_in_flight` jobs concurrently per tick.
	pub async fn run_forever(&self) -> Result<()> {
		loop {
			let claimed = self.claim_batch(self.max_in_flight).await?;
			if claimed.is_empty() {
				async_std::task::sleep(self.poll_interval).await;
				continue;
			}
			let handles: Vec<_> = claimed.into_iter().map(|row| self.run_claimed(row)).collect();
			futures::future::join_all(handles).await;
		}
	}

	/// Runs a single poll tick; returns the number of jobs processed. Used by tests and
	/// by hosts that want to drive the loop themselves instead of calling `run_forever`.
	pub async fn run_pending_once(&self) -> Result<usize> {
		let claimed = self.claim_batch(self.max_in_flight).await?;
		let n = claimed.len();
		let handles: Vec<_> = claimed.into_iter().map(|row| self.run_claimed(row)).collect();
		futures::future::join_all(handles).await;
		Ok(n)
	}

	async fn claim_batch(&self, limit: usize) -> Result<Vec<ClaimedRow>> {
		let mut tx = self.store.begin().await?;
		let rows = sqlx::query_as::<_, ClaimedRow>(
			"SELECT id, job_type, payload, attempts FROM scheduled_jobs \
			 WHERE run_at <= now() AND locked_at IS NULL \
			 ORDER BY run_at ASC LIMIT $1 FOR UPDATE SKIP LOCKED",
		)
		.bind(limit as i64)
		.fetch_all(&mut *tx)
		.await?;

		for row in &rows {
			sqlx::query("UPDATE scheduled_jobs SET locked_at = now(), locked_by = $2 WHERE id = $1")
				.bind(row.id)
				.bind(&self.worker_id)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;
		Ok(rows)
	}

	async fn run_claimed(&self, row: ClaimedRow) {
		let result = self.registry.dispatch(BackgroundJob { job_type: row.job_type.clone(), payload: row.payload }, &self.environment).await;
		match result {
			Ok(()) => {
				if let Err(e) = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1").bind(row.id).execute(self.store.pool()).await {
					log::error!("failed to delete completed job {}: {}", row.id, e);
				}
			}
			Err(e) if e.is_retryable() => {
				log::warn!("job {} ({}) failed, will retry: {}", row.id, row.job_type, e);
				let backoff = Duration::from_secs(2u64.saturating_pow((row.attempts + 1).min(10) as u32));
				if let Err(e) = sqlx::query(
					"UPDATE scheduled_jobs SET locked_at = NULL, locked_by = NULL, attempts = attempts + 1, \
					 last_error = $2, run_at = now() + $3::interval WHERE id = $1",
				)
				.bind(row.id)
				.bind(e.to_string())
				.bind(format!("{} seconds", backoff.as_secs()))
				.execute(self.store.pool())
				.await
				{
					log::error!("failed to reschedule job {}: {}", row.id, e);
				}
			}
			Err(e) => {
				log::error!("job {} ({}) failed permanently, not retrying: {}", row.id, row.job_type, e);
				if let Err(e) = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1").bind(row.id).execute(self.store.pool()).await {
					log::error!("failed to delete permanently-failed job {}: {}", row.id, e);
				}
			}
		}
	}
}

#[allow(dead_code)]
fn count_pending_sql() -> &'static str {
	"SELECT count(*) FROM scheduled_jobs WHERE locked_at IS NULL"
}

#[allow(dead_code)]
async fn pending_count(store: &Store) -> Result<i64> {
	let row = sqlx::query(count_pending_sql()).fetch_one(store.pool()).await?;
	Ok(row.try_get::<i64, _>(0)?)
}

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

//! Task scheduler interface (§4.F): named durable jobs with `EnqueueIn`/`EnqueueAt`,
//! transactional enqueue, and at-least-once delivery.

pub mod pg;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Postgres, Transaction};

use crate::error::{CoreError, Result};

/// A durable background job. `JOB_TYPE` is the key stored alongside its serialized payload.
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync {
	type Environment: 'static + Send + Sync;

	const JOB_TYPE: &'static str;

	async fn perform(self, env: &Self::Environment) -> Result<()>;
}

/// Row shape of a queued job: job type plus its JSON payload, matching `scheduled_jobs`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackgroundJob {
	pub job_type: String,
	pub payload: serde_json::Value,
}

impl BackgroundJob {
	pub fn of<T: Job>(job: &T) -> Result<Self> {
		Ok(Self { job_type: T::JOB_TYPE.to_string(), payload: serde_json::to_value(job)? })
	}
}

/// Enqueues `job` to run at or after `when`, visible only if the transaction commits (§4.F).
pub async fn enqueue_at<T: Job>(tx: &mut Transaction<'_, Postgres>, when: DateTime<Utc>, job: &T) -> Result<()> {
	let bg = BackgroundJob::of(job)?;
	sqlx::query("INSERT INTO scheduled_jobs (job_type, payload, run_at) VALUES ($1, $2, $3)")
		.bind(&bg.job_type)
		.bind(&bg.payload)
		.bind(when)
		.execute(&mut **tx)
		.await?;
	Ok(())
}

/// Enqueues `job` to run at or after `now + delay`.
pub async fn enqueue_in<T: Job>(tx: &mut Transaction<'_, Postgres>, delay: chrono::Duration, job: &T) -> Result<()> {
	enqueue_at(tx, Utc::now() + delay, job).await
}

/// Object-safe wrapper used by the registry to dispatch a job's payload to its handler
/// without the registry itself being generic over every job type.
#[async_trait]
trait PerformErased<Env>: Send + Sync {
	async fn perform_erased(&self, payload: serde_json::Value, env: &Env) -> Result<()>;
}

struct TypedHandler<T>(std::marker::PhantomData<T>);

#[async_trait]
impl<T: Job> PerformErased<T::Environment> for TypedHandler<T> {
	async fn perform_erased(&self, payload: serde_json::Value, env: &T::Environment) -> Result<()> {
		let job: T = serde_json::from_value(payload)?;
		job.perform(env).await
	}
}

/// Maps `JOB_TYPE` strings to their handler, so the runner can dispatch arbitrary rows.
pub struct Registry<Env> {
	handlers: BTreeMap<&'static str, Arc<dyn PerformErased<Env>>>,
}

impl<Env: 'static + Send + Sync> Registry<Env> {
	pub fn new() -> Self {
		Self { handlers: BTreeMap::new() }
	}

	pub fn register<T: Job<Environment = Env> + 'static>(mut self) -> Self {
		self.handlers.insert(T::JOB_TYPE, Arc::new(TypedHandler::<T>(std::marker::PhantomData)));
		self
	}

	pub(crate) async fn dispatch(&self, job: BackgroundJob, env: &Env) -> Result<()> {
		let handler = self.handlers.get(job.job_type.as_str()).ok_or_else(|| CoreError::StructuralInvariant(format!("unknown job type {}", job.job_type)))?;
		handler.perform_erased(job.payload, env).await
	}
}

impl<Env: 'static + Send + Sync> Default for Registry<Env> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Serialize, serde::Deserialize)]
	struct Ping {
		n: u32,
	}

	#[async_trait]
	impl Job for Ping {
		type Environment = ();
		const JOB_TYPE: &'static str = "ping";

		async fn perform(self, _env: &()) -> Result<()> {
			Ok(())
		}
	}

	#[async_std::test]
	async fn registry_dispatches_by_job_type() {
		let registry = Registry::<()>::new().register::<Ping>();
		let bg = BackgroundJob::of(&Ping { n: 1 }).unwrap();
		registry.dispatch(bg, &()).await.unwrap();
	}

	#[async_std::test]
	async fn registry_rejects_unknown_job_type() {
		let registry = Registry::<()>::new();
		let bg = BackgroundJob { job_type: "nope".into(), payload: serde_json::json!({}) };
		let err = registry.dispatch(bg, &()).await.unwrap_err();
		assert!(matches!(err, CoreError::StructuralInvariant(_)));
	}
}

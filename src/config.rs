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

//! Knobs controlling resolver, scheduler and database behavior.

use serde::Deserialize;

/// Fallback phase length in minutes, used when a game's own `phase_length_minutes == 0`.
///
/// §4.C.4 / §9: the source measures this in minutes, not a `Duration`; we keep that unit
/// so a stored game's `phase_length_minutes` and this constant compare directly.
pub const MAX_PHASE_DEADLINE_MINUTES: i64 = 24 * 60;

/// Push notification coalescing tag shared by every new-phase push (§6).
pub const PUSH_NEW_PHASE_TAG: &str = "diplicity-engine-new-phase";

/// Depth cap on the resolver's tail-call loop (§4.C.9, §9 open question).
///
/// A pathological variant with infinite no-option phases would not terminate;
/// this bounds the loop and surfaces the condition as a structural error instead.
pub const MAX_TAIL_CALL_DEPTH: u32 = 64;

/// Number of users processed per batch in token maintenance (§4.E).
pub const TOKEN_MAINTENANCE_BATCH_SIZE: usize = 4;

#[derive(Copy, Clone, Debug, Deserialize)]
pub struct ControlConfig {
	/// Connections kept warm in the store's Postgres pool.
	#[serde(default = "default_db_pool_min")]
	pub db_pool_min: u32,
	/// Maximum connections the store's Postgres pool may open.
	#[serde(default = "default_db_pool_max")]
	pub db_pool_max: u32,
	/// How often the scheduler's runner polls for due jobs.
	#[serde(default = "default_poll_interval_ms")]
	pub scheduler_poll_interval_ms: u64,
	/// Maximum jobs processed concurrently by one runner.
	#[serde(default = "default_max_in_flight_jobs")]
	pub scheduler_max_in_flight_jobs: usize,
	/// Time a job handler is given to complete before the runner treats it as timed out.
	#[serde(default = "default_job_timeout_secs")]
	pub scheduler_job_timeout_secs: u64,
}

impl Default for ControlConfig {
	fn default() -> Self {
		Self {
			db_pool_min: default_db_pool_min(),
			db_pool_max: default_db_pool_max(),
			scheduler_poll_interval_ms: default_poll_interval_ms(),
			scheduler_max_in_flight_jobs: default_max_in_flight_jobs(),
			scheduler_job_timeout_secs: default_job_timeout_secs(),
		}
	}
}

const fn default_db_pool_min() -> u32 {
	2
}

const fn default_db_pool_max() -> u32 {
	16
}

const fn default_poll_interval_ms() -> u64 {
	500
}

fn default_max_in_flight_jobs() -> usize {
	num_cpus::get() * 2
}

const fn default_job_timeout_secs() -> u64 {
	30
}

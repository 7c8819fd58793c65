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

use std::{env, fmt, io};
use thiserror::Error;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Turn-resolution core error enum.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error(transparent)]
	Io(#[from] io::Error),
	#[error(transparent)]
	Env(#[from] env::VarError),

	#[error(transparent)]
	Serialization(#[from] serde_json::Error),
	#[error(transparent)]
	Fmt(#[from] fmt::Error),

	#[error("sqlx error: {0}")]
	Sql(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),

	/// A channel to another task was closed before a reply arrived.
	#[error("trying to send to a disconnected task")]
	Disconnected,
	#[error("sending on a disconnected channel")]
	Channel,

	/// member not found by nation when one is expected to exist. Unrecoverable.
	#[error("structural invariant violation: {0}")]
	StructuralInvariant(String),

	/// corrupted zippedOptions, malformed mail address, push 400. Log and succeed.
	#[error("permanent payload error: {0}")]
	PermanentPayload(String),

	/// push 401, transport failures, transient store failures. Retry via scheduler.
	#[error("transient error: {0}")]
	Transient(String),

	#[error("rust standard library does not support negative durations")]
	TimestampOutOfRange,

	#[error("rules engine error: {0}")]
	Rules(String),
}

impl CoreError {
	/// Whether the scheduler should retry the job that produced this error.
	///
	/// Transient store/service failures are retried; permanent payload errors
	/// and structural invariant violations are not, per §7's propagation policy.
	pub fn is_retryable(&self) -> bool {
		matches!(self, CoreError::Sql(_) | CoreError::Io(_) | CoreError::Transient(_) | CoreError::Disconnected | CoreError::Channel)
	}
}


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

//! Process-wide push credential cache (§5, §9): a lazily-initialized, read-mostly cell
//! with a one-shot fill guarded by a lock. Invalidation is operational (process restart).

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::{CoreError, Result};
use crate::store::Store;

static FCM_CONF: OnceCell<RwLock<Option<String>>> = OnceCell::new();

fn cell() -> &'static RwLock<Option<String>> {
	FCM_CONF.get_or_init(|| RwLock::new(None))
}

/// Returns the cached server key, filling it from the store on first use.
///
/// The lock is never held across the `.await` below: `parking_lot` guards are not `Send`,
/// so holding one past a suspension point would make this future unusable on the scheduler.
pub async fn server_key(store: &Store) -> Result<String> {
	if let Some(key) = cell().read().clone() {
		return Ok(key);
	}

	let key = load_from_store(store).await?;

	let mut guard = cell().write();
	if let Some(existing) = guard.clone() {
		return Ok(existing);
	}
	*guard = Some(key.clone());
	Ok(key)
}

async fn load_from_store(store: &Store) -> Result<String> {
	let row: (String,) = sqlx::query_as("SELECT server_key FROM fcm_conf WHERE id = 1").fetch_optional(store.pool()).await?.ok_or_else(|| CoreError::StructuralInvariant("fcm_conf is not configured".into()))?;
	Ok(row.0)
}

/// Write-once insert (§6): fails if a server key is already persisted.
pub async fn install(store: &Store, server_key: &str) -> Result<()> {
	sqlx::query("INSERT INTO fcm_conf (id, server_key) VALUES (1, $1)").bind(server_key).execute(store.pool()).await?;
	Ok(())
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
	*cell().write() = None;
}

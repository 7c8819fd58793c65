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

//! Token maintenance (§4.E `manageFCMTokens`): batches of at most 4 users per transaction,
//! removals before updates. Passes the *residual* of whichever list it just processed in
//! the continuation, fixing the inversion described in §9.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::TOKEN_MAINTENANCE_BATCH_SIZE;
use crate::env::CoreEnv;
use crate::error::Result;
use crate::scheduler::{enqueue_at, Job};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRemoval {
	pub user_id: String,
	pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUpdate {
	pub user_id: String,
	pub old_token: String,
	pub new_token: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManageFcmTokensJob {
	pub to_remove: Vec<TokenRemoval>,
	pub to_update: Vec<TokenUpdate>,
}

#[async_trait]
impl Job for ManageFcmTokensJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "manage_fcm_tokens";

	async fn perform(self, env: &CoreEnv) -> Result<()> {
		let ManageFcmTokensJob { mut to_remove, mut to_update } = self;

		if !to_remove.is_empty() {
			let (batch, rest) = take_batch_by_user(to_remove, TOKEN_MAINTENANCE_BATCH_SIZE);
			for removal in &batch {
				env.user_config.disable_token(&removal.user_id, &removal.token, "push service reported the token as invalid").await?;
			}
			to_remove = rest;
			if !to_remove.is_empty() || !to_update.is_empty() {
				let mut tx = env.store.begin().await?;
				enqueue_at(&mut tx, Utc::now(), &ManageFcmTokensJob { to_remove, to_update }).await?;
				tx.commit().await?;
			}
			return Ok(());
		}

		if !to_update.is_empty() {
			let (batch, rest) = take_batch_by_user(to_update, TOKEN_MAINTENANCE_BATCH_SIZE);
			for update in &batch {
				env.user_config.update_token(&update.user_id, &update.old_token, &update.new_token).await?;
			}
			to_update = rest;
			if !to_update.is_empty() {
				let mut tx = env.store.begin().await?;
				enqueue_at(&mut tx, Utc::now(), &ManageFcmTokensJob { to_remove: Vec::new(), to_update }).await?;
				tx.commit().await?;
			}
		}

		Ok(())
	}
}

/// Splits off the first `max_users` distinct users' worth of entries, preserving order.
fn take_batch_by_user<T: HasUser>(items: Vec<T>, max_users: usize) -> (Vec<T>, Vec<T>) {
	let mut seen = std::collections::BTreeSet::new();
	let mut batch = Vec::new();
	let mut rest = Vec::new();
	for item in items {
		if seen.contains(item.user_id()) {
			batch.push(item);
			continue;
		}
		if seen.len() < max_users {
			seen.insert(item.user_id().to_string());
			batch.push(item);
		} else {
			rest.push(item);
		}
	}
	(batch, rest)
}

trait HasUser {
	fn user_id(&self) -> &str;
}

impl HasUser for TokenRemoval {
	fn user_id(&self) -> &str {
		&self.user_id
	}
}

impl HasUser for TokenUpdate {
	fn user_id(&self) -> &str {
		&self.user_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn removal(user: &str, token: &str) -> TokenRemoval {
		TokenRemoval { user_id: user.into(), token: token.into() }
	}

	#[test]
	fn batches_by_distinct_user_not_by_entry_count() {
		let items = vec![removal("a", "t1"), removal("a", "t2"), removal("b", "t1"), removal("c", "t1"), removal("d", "t1"), removal("e", "t1")];
		let (batch, rest) = take_batch_by_user(items, 4);
		let users: std::collections::BTreeSet<_> = batch.iter().map(|r| r.user_id.clone()).collect();
		assert_eq!(users.len(), 4);
		assert_eq!(rest.len(), 1);
		assert_eq!(rest[0].user_id, "e");
	}

	#[test]
	fn empty_input_produces_empty_batches() {
		let (batch, rest) = take_batch_by_user::<TokenRemoval>(vec![], 4);
		assert!(batch.is_empty());
		assert!(rest.is_empty());
	}
}

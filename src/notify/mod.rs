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

//! Notification pipeline (§4.D): per-game fan-out to per-user, per-channel delivery jobs.

pub mod mail;
pub mod push;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::env::CoreEnv;
use crate::error::Result;
use crate::scheduler::{enqueue_at, Job};
use crate::store::models::PhaseMeta;

/// `sendPhaseNotificationsToUsers`: enqueues push+mail for the first user, recurses for
/// the rest. One recipient per job bounds fan-out per tick and transactional contention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FanoutJob {
	pub host: String,
	pub scheme: String,
	pub game_id: i64,
	pub ordinal: i32,
	pub phase_meta: PhaseMeta,
	/// `(user_id, nation)` pairs still to notify.
	pub recipients: Vec<(String, String)>,
}

#[async_trait]
impl Job for FanoutJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "send_phase_notifications_to_users";

	async fn perform(self, env: &CoreEnv) -> Result<()> {
		let (user_id, nation) = match self.recipients.first() {
			Some(pair) => pair.clone(),
			None => return Ok(()),
		};

		let mut tx = env.store.begin().await?;

		enqueue_at(
			&mut tx,
			Utc::now(),
			&push::SendPhaseNotificationToFcmJob {
				host: self.host.clone(),
				scheme: self.scheme.clone(),
				game_id: self.game_id,
				ordinal: self.ordinal,
				user_id: user_id.clone(),
				nation: nation.clone(),
				phase_meta: self.phase_meta.clone(),
				finished_tokens: Vec::new(),
			},
		)
		.await?;

		enqueue_at(
			&mut tx,
			Utc::now(),
			&mail::MailJob {
				host: self.host.clone(),
				scheme: self.scheme.clone(),
				game_id: self.game_id,
				ordinal: self.ordinal,
				user_id,
				nation,
				season: self.phase_meta.season.clone(),
				year: self.phase_meta.year,
				phase_type: self.phase_meta.phase_type.clone(),
			},
		)
		.await?;

		if self.recipients.len() > 1 {
			enqueue_at(&mut tx, Utc::now(), &FanoutJob { recipients: self.recipients[1..].to_vec(), ..self }).await?;
		}

		tx.commit().await?;
		Ok(())
	}
}

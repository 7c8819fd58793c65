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

//! `sendPhaseNotificationsToFCM` (§4.D): per-token per-job push fan-out, one enqueue per
//! tick to keep transactions small and give each tag its own failure handling (§9).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::PUSH_NEW_PHASE_TAG;
use crate::env::CoreEnv;
use crate::error::Result;
use crate::options::zip_phase_payload;
use crate::push::dispatch::FcmSendToTokensJob;
use crate::push::sender::PushNotification;
use crate::scheduler::{enqueue_at, Job};
use crate::store::models::PhaseMeta;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendPhaseNotificationToFcmJob {
	pub host: String,
	pub scheme: String,
	pub game_id: i64,
	pub ordinal: i32,
	pub user_id: String,
	pub nation: String,
	pub phase_meta: PhaseMeta,
	pub finished_tokens: Vec<String>,
}

#[async_trait]
impl Job for SendPhaseNotificationToFcmJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "send_phase_notification_to_fcm";

	async fn perform(mut self, env: &CoreEnv) -> Result<()> {
		let user_config = match env.user_config.load(&self.user_id).await? {
			Some(c) => c,
			None => return Ok(()),
		};

		let remaining: Vec<_> = user_config
			.tokens
			.iter()
			.filter(|t| !t.disabled && !self.finished_tokens.contains(&t.value))
			.collect();

		let token = match remaining.first() {
			Some(t) => (*t).clone(),
			None => return Ok(()),
		};
		let is_last = remaining.len() == 1;

		self.finished_tokens.push(token.value.clone());

		let click_action = format!("{}://{}/Game/{}/Phase/{}/Map", self.scheme, self.host, self.game_id, self.ordinal);
		let mut notification = PushNotification {
			title: format!("{}: {} {}, {}", self.nation, self.phase_meta.season, self.phase_meta.year, self.phase_meta.phase_type),
			body: format!("{} has a new phase.", self.nation),
			tag: PUSH_NEW_PHASE_TAG.to_string(),
			click_action,
		};
		if let Some(cfg) = &token.phase_config {
			if let Some(title) = &cfg.title_override {
				notification.title = title.clone();
			}
			if let Some(body) = &cfg.body_override {
				notification.body = body.clone();
			}
		}

		let payload = zip_phase_payload(self.game_id, &self.phase_meta)?;
		let mut data = BTreeMap::new();
		data.insert("DiplicityJSON".to_string(), hex::encode(payload));

		let mut tokens = BTreeMap::new();
		tokens.insert(self.user_id.clone(), vec![token.value.clone()]);

		let mut tx = env.store.begin().await?;
		enqueue_at(&mut tx, Utc::now(), &FcmSendToTokensJob { last_delay_secs: 0, notification, data, tokens }).await?;
		if !is_last {
			enqueue_at(&mut tx, Utc::now(), &self).await?;
		}
		tx.commit().await?;
		Ok(())
	}
}

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

//! Mail job (§4.D): loads phase/game/user/config, skips silently when there is nothing to
//! send, and otherwise builds and sends a new-phase notification email.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::env::CoreEnv;
use crate::error::{CoreError, Result};
use crate::scheduler::Job;

#[derive(Clone, Debug)]
pub struct MailMessage {
	pub from: String,
	pub to: String,
	pub subject: String,
	pub text: String,
	pub headers: Vec<(String, String)>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
	async fn send(&self, message: MailMessage) -> Result<()>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailJob {
	pub host: String,
	pub scheme: String,
	pub game_id: i64,
	pub ordinal: i32,
	pub user_id: String,
	pub nation: String,
	pub season: String,
	pub year: i32,
	pub phase_type: String,
}

#[async_trait]
impl Job for MailJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "send_phase_mail";

	async fn perform(self, env: &CoreEnv) -> Result<()> {
		let user_config = match env.user_config.load(&self.user_id).await? {
			Some(c) => c,
			None => return Ok(()),
		};
		if !user_config.mail_config.enabled {
			return Ok(());
		}

		let map_url = format!("{}://{}/Game/{}/Phase/{}/Map", self.scheme, self.host, self.game_id, self.ordinal);
		let unsubscribe_url = format!("{}://{}/User/{}/Unsubscribe", self.scheme, self.host, self.user_id);
		let subject = format!("{}: {} {}, {}", self.nation, self.season, self.year, self.phase_type);
		let text = format!("{}\n\nView the map: {}\n\nUnsubscribe: {}", subject, map_url, unsubscribe_url);

		let message = MailMessage {
			from: "noreply@turnresolve".to_string(),
			to: self.user_id.clone(),
			subject,
			text,
			headers: vec![("List-Unsubscribe".to_string(), format!("<{}>", unsubscribe_url))],
		};

		match env.mailer.send(message).await {
			Ok(()) => Ok(()),
			Err(CoreError::PermanentPayload(msg)) => {
				log::warn!("permanent mail address failure for {}: {}", self.user_id, msg);
				Ok(())
			}
			Err(e) => Err(e),
		}
	}
}

/// In-memory `Mailer` test double (SPEC_FULL §2 row D).
#[cfg(test)]
pub(crate) mod fakes {
	use std::sync::Mutex;

	use super::*;

	/// Records every message sent; `fail_with` makes the next `send` return that error instead.
	#[derive(Default)]
	pub(crate) struct MockMailer {
		pub(crate) sent: Mutex<Vec<MailMessage>>,
		pub(crate) fail_with: Mutex<Option<CoreError>>,
	}

	#[async_trait]
	impl Mailer for MockMailer {
		async fn send(&self, message: MailMessage) -> Result<()> {
			if let Some(err) = self.fail_with.lock().unwrap().take() {
				return Err(err);
			}
			self.sent.lock().unwrap().push(message);
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notify::mail::fakes::MockMailer;

	#[async_std::test]
	async fn mock_mailer_records_sent_messages() {
		let mailer = MockMailer::default();
		let message = MailMessage { from: "a@b".into(), to: "c@d".into(), subject: "s".into(), text: "t".into(), headers: Vec::new() };
		mailer.send(message).await.unwrap();
		assert_eq!(mailer.sent.lock().unwrap().len(), 1);
	}

	#[async_std::test]
	async fn mock_mailer_fails_once_then_resumes_recording() {
		let mailer = MockMailer::default();
		*mailer.fail_with.lock().unwrap() = Some(CoreError::Transient("smtp down".into()));
		let message = MailMessage { from: "a@b".into(), to: "c@d".into(), subject: "s".into(), text: "t".into(), headers: Vec::new() };

		let err = mailer.send(message.clone()).await.unwrap_err();
		assert!(matches!(err, CoreError::Transient(_)));
		assert!(mailer.sent.lock().unwrap().is_empty());

		mailer.send(message).await.unwrap();
		assert_eq!(mailer.sent.lock().unwrap().len(), 1);
	}

	#[test]
	fn subject_matches_fixed_template() {
		let job = MailJob {
			host: "example.com".into(),
			scheme: "https".into(),
			game_id: 1,
			ordinal: 2,
			user_id: "u1".into(),
			nation: "France".into(),
			season: "Fall".into(),
			year: 1901,
			phase_type: "Movement".into(),
		};
		let subject = format!("{}: {} {}, {}", job.nation, job.season, job.year, job.phase_type);
		assert_eq!(subject, "France: Fall 1901, Movement");
	}
}

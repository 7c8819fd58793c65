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

//! The user-config collaborator (§3): opaque storage for a user's push tokens and mail
//! preferences, outside the game entity group.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PhaseConfig {
	pub title_override: Option<String>,
	pub body_override: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushToken {
	pub value: String,
	pub disabled: bool,
	pub note: String,
	pub phase_config: Option<PhaseConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MailConfig {
	pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
	pub user_id: String,
	pub tokens: Vec<PushToken>,
	pub mail_config: MailConfig,
}

#[async_trait]
pub trait UserConfigStore: Send + Sync {
	/// Absence is not an error (§4.D): callers skip silently when a user has no config.
	async fn load(&self, user_id: &str) -> Result<Option<UserConfig>>;

	async fn disable_token(&self, user_id: &str, token: &str, reason: &str) -> Result<()>;

	async fn update_token(&self, user_id: &str, old_token: &str, new_token: &str) -> Result<()>;
}

/// In-memory `UserConfigStore` test double (SPEC_FULL §2 rows D/E).
#[cfg(test)]
pub(crate) mod fakes {
	use std::collections::BTreeMap;
	use std::sync::Mutex;

	use super::*;

	#[derive(Default)]
	pub(crate) struct MockUserConfigStore {
		configs: Mutex<BTreeMap<String, UserConfig>>,
		pub(crate) disabled: Mutex<Vec<(String, String)>>,
		pub(crate) updated: Mutex<Vec<(String, String, String)>>,
	}

	impl MockUserConfigStore {
		pub(crate) fn with(configs: Vec<UserConfig>) -> Self {
			Self { configs: Mutex::new(configs.into_iter().map(|c| (c.user_id.clone(), c)).collect()), disabled: Mutex::new(Vec::new()), updated: Mutex::new(Vec::new()) }
		}
	}

	#[async_trait]
	impl UserConfigStore for MockUserConfigStore {
		async fn load(&self, user_id: &str) -> Result<Option<UserConfig>> {
			Ok(self.configs.lock().unwrap().get(user_id).cloned())
		}

		async fn disable_token(&self, user_id: &str, token: &str, _reason: &str) -> Result<()> {
			self.disabled.lock().unwrap().push((user_id.to_string(), token.to_string()));
			Ok(())
		}

		async fn update_token(&self, user_id: &str, old_token: &str, new_token: &str) -> Result<()> {
			self.updated.lock().unwrap().push((user_id.to_string(), old_token.to_string(), new_token.to_string()));
			Ok(())
		}
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		fn sample() -> UserConfig {
			UserConfig { user_id: "u1".into(), tokens: Vec::new(), mail_config: MailConfig { enabled: true } }
		}

		#[async_std::test]
		async fn load_returns_none_for_unknown_user() {
			let store = MockUserConfigStore::with(vec![sample()]);
			assert!(store.load("nobody").await.unwrap().is_none());
		}

		#[async_std::test]
		async fn load_returns_configured_user() {
			let store = MockUserConfigStore::with(vec![sample()]);
			let config = store.load("u1").await.unwrap().expect("u1 was seeded");
			assert!(config.mail_config.enabled);
		}

		#[async_std::test]
		async fn disable_and_update_token_record_calls() {
			let store = MockUserConfigStore::with(vec![sample()]);
			store.disable_token("u1", "tok", "stale").await.unwrap();
			store.update_token("u1", "tok", "tok2").await.unwrap();
			assert_eq!(store.disabled.lock().unwrap().as_slice(), &[("u1".to_string(), "tok".to_string())]);
			assert_eq!(store.updated.lock().unwrap().as_slice(), &[("u1".to_string(), "tok".to_string(), "tok2".to_string())]);
		}
	}
}

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

//! The push service contract (§6): an opaque sender taking a server key, a token list,
//! a notification and a data payload, and returning per-token results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PushNotification {
	pub title: String,
	pub body: String,
	pub tag: String,
	pub click_action: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushRequest {
	pub server_key: String,
	pub tokens: Vec<String>,
	pub notification: PushNotification,
	/// The binary `DiplicityJSON` attribute (§6), zlib-compressed JSON, hex-encoded on the wire.
	pub data: std::collections::BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResult {
	pub registration_id: Option<String>,
	pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PushResponse {
	pub status_code: u16,
	pub success: u32,
	pub fail: u32,
	pub retry_after: Option<String>,
	pub results: Vec<TokenResult>,
}

#[async_trait]
pub trait PushSender: Send + Sync {
	async fn send(&self, request: PushRequest) -> Result<PushResponse>;
}

/// Known per-token error tags (§4.E), matched to decide update/remove/retry/ignore.
pub mod error_tag {
	pub const INVALID_REGISTRATION: &str = "InvalidRegistration";
	pub const NOT_REGISTERED: &str = "NotRegistered";
	pub const MISMATCH_SENDER_ID: &str = "MismatchSenderId";
	pub const UNAVAILABLE: &str = "Unavailable";
	pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";
}

/// In-memory `PushSender` test double (SPEC_FULL §2 row E).
#[cfg(test)]
pub(crate) mod fakes {
	use std::sync::Mutex;

	use super::*;

	/// Replays one canned response and records every request it receives.
	pub(crate) struct MockPushSender {
		response: Mutex<Option<PushResponse>>,
		pub(crate) requests: Mutex<Vec<PushRequest>>,
	}

	impl MockPushSender {
		pub(crate) fn returning(response: PushResponse) -> Self {
			Self { response: Mutex::new(Some(response)), requests: Mutex::new(Vec::new()) }
		}
	}

	#[async_trait]
	impl PushSender for MockPushSender {
		async fn send(&self, request: PushRequest) -> Result<PushResponse> {
			self.requests.lock().unwrap().push(request);
			self.response.lock().unwrap().clone().ok_or_else(|| crate::error::CoreError::Transient("mock push sender has no response queued".into()))
		}
	}
}

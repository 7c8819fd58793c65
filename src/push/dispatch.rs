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

//! Push dispatcher (§4.E): `fcmSendToTokens`, response-driven token maintenance and retry.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::env::CoreEnv;
use crate::error::Result;
use crate::push::conf;
use crate::push::maintenance::{ManageFcmTokensJob, TokenRemoval, TokenUpdate};
use crate::push::sender::{error_tag, PushNotification, PushRequest, PushResponse};
use crate::scheduler::{enqueue_at, Job};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FcmSendToTokensJob {
	/// Delay (seconds) used for the attempt that produced this job, for exponential backoff.
	pub last_delay_secs: i64,
	pub notification: PushNotification,
	pub data: BTreeMap<String, String>,
	/// Tokens to notify, keyed by owning user id.
	pub tokens: BTreeMap<String, Vec<String>>,
}

#[async_trait]
impl Job for FcmSendToTokensJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "fcm_send_to_tokens";

	async fn perform(self, env: &CoreEnv) -> Result<()> {
		let (token_list, user_by_token) = flatten(&self.tokens);
		if token_list.is_empty() {
			return Ok(());
		}

		let server_key = conf::server_key(&env.store).await?;
		let request = PushRequest { server_key, tokens: token_list.clone(), notification: self.notification.clone(), data: self.data.clone() };
		let response = env.push_sender.send(request).await?;

		let decision = decide(&self.tokens, &token_list, &user_by_token, &response, self.last_delay_secs);

		if let Some(result) = decision.early_return {
			return result;
		}

		if let Some(maintenance) = decision.maintenance {
			let mut tx = env.store.begin().await?;
			enqueue_at(&mut tx, Utc::now(), &maintenance).await?;
			tx.commit().await?;
		}

		if let Some(retry) = decision.retry {
			let mut tx = env.store.begin().await?;
			enqueue_at(
				&mut tx,
				Utc::now() + chrono::Duration::seconds(retry.delay_secs),
				&FcmSendToTokensJob { last_delay_secs: retry.delay_secs, notification: self.notification, data: self.data, tokens: retry.tokens },
			)
			.await?;
			tx.commit().await?;
		}

		Ok(())
	}
}

/// What a retry should look like: the token set to resend and the delay to honor first.
struct RetryDecision {
	tokens: BTreeMap<String, Vec<String>>,
	delay_secs: i64,
}

/// What `perform` should do once the gateway has answered.
struct Decision {
	/// Set when the job should stop now and return this, skipping maintenance/retry entirely.
	early_return: Option<Result<()>>,
	maintenance: Option<ManageFcmTokensJob>,
	retry: Option<RetryDecision>,
}

/// The store-independent half of §4.E: given the gateway's response, decides what happens
/// next. Kept separate from `perform` so the response classification — the hardest part of
/// the dispatcher — is directly unit-testable without a live store.
fn decide(tokens: &BTreeMap<String, Vec<String>>, token_list: &[String], user_by_token: &BTreeMap<String, String>, response: &PushResponse, last_delay_secs: i64) -> Decision {
	match response.status_code {
		401 => {
			log::warn!("push credentials rejected (401); retry until an operator repairs them");
			return Decision { early_return: Some(Err(crate::error::CoreError::Transient("push credentials rejected".into()))), maintenance: None, retry: None };
		}
		400 => {
			log::warn!("push payload permanently malformed (400); dropping");
			return Decision { early_return: Some(Ok(())), maintenance: None, retry: None };
		}
		200..=299 => {}
		other => {
			// Neither a success nor one of the two statuses the gateway contract special-cases:
			// retry the whole payload rather than silently dropping it (§9).
			log::warn!("push gateway returned unexpected status {}; retrying the full payload", other);
			return Decision {
				early_return: None,
				maintenance: None,
				retry: Some(RetryDecision { tokens: tokens.clone(), delay_secs: next_delay(last_delay_secs, response.retry_after.as_deref()) }),
			};
		}
	}

	let mut ids_to_update: Vec<TokenUpdate> = Vec::new();
	let mut ids_to_remove: Vec<TokenRemoval> = Vec::new();
	let mut ids_to_retry: BTreeMap<String, Vec<String>> = BTreeMap::new();

	for (token, result) in token_list.iter().zip(response.results.iter()) {
		let user_id = user_by_token.get(token).cloned().unwrap_or_default();
		if let Some(new_token) = &result.registration_id {
			ids_to_update.push(TokenUpdate { user_id: user_id.clone(), old_token: token.clone(), new_token: new_token.clone() });
		}
		if let Some(err) = &result.error {
			match err.as_str() {
				error_tag::INVALID_REGISTRATION | error_tag::NOT_REGISTERED | error_tag::MISMATCH_SENDER_ID => {
					ids_to_remove.push(TokenRemoval { user_id: user_id.clone(), token: token.clone() });
				}
				error_tag::UNAVAILABLE | error_tag::INTERNAL_SERVER_ERROR => {
					ids_to_retry.entry(user_id).or_default().push(token.clone());
				}
				other => log::info!("push token {} returned non-retryable error {}", token, other),
			}
		}
	}

	let maintenance = if !ids_to_remove.is_empty() || !ids_to_update.is_empty() { Some(ManageFcmTokensJob { to_remove: ids_to_remove, to_update: ids_to_update }) } else { None };
	let retry = if !ids_to_retry.is_empty() { Some(RetryDecision { tokens: ids_to_retry, delay_secs: next_delay(last_delay_secs, response.retry_after.as_deref()) }) } else { None };

	Decision { early_return: None, maintenance, retry }
}

fn flatten(tokens: &BTreeMap<String, Vec<String>>) -> (Vec<String>, BTreeMap<String, String>) {
	let mut list = Vec::new();
	let mut owner = BTreeMap::new();
	for (user_id, user_tokens) in tokens {
		for t in user_tokens {
			if t.is_empty() {
				continue;
			}
			owner.insert(t.clone(), user_id.clone());
			list.push(t.clone());
		}
	}
	(list, owner)
}

/// Computes the next retry delay in seconds (§4.E.6).
fn next_delay(last_delay_secs: i64, retry_after: Option<&str>) -> i64 {
	if let Some(raw) = retry_after {
		if let Ok(minutes) = raw.parse::<i64>() {
			return minutes * 60;
		}
		// The source parses with Go's `time.RFC1123` ("Mon, 02 Jan 2006 15:04:05 MST"), which
		// the gateway only ever fills in with the named zone "GMT". `parse_from_rfc2822` accepts
		// that same header, plus numeric offsets the source's parser would reject; since the
		// gateway never sends the latter, the wider acceptance here is harmless in practice.
		if let Ok(when) = DateTime::parse_from_rfc2822(raw) {
			let delta = when.with_timezone(&Utc) - Utc::now();
			return delta.num_seconds().max(0);
		}
	}
	(last_delay_secs * 2).max(1)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::push::sender::fakes::MockPushSender;
	use crate::push::sender::{PushSender, TokenResult};

	#[test]
	fn default_delay_doubles_with_a_one_second_floor() {
		assert_eq!(next_delay(0, None), 1);
		assert_eq!(next_delay(5, None), 10);
	}

	#[test]
	fn retry_after_integer_is_minutes() {
		assert_eq!(next_delay(5, Some("2")), 120);
	}

	#[test]
	fn retry_after_timestamp_is_difference_from_now() {
		let future = Utc::now() + chrono::Duration::seconds(90);
		let raw = future.to_rfc2822();
		let delay = next_delay(5, Some(&raw));
		assert!((80..=90).contains(&delay));
	}

	#[test]
	fn flatten_skips_empty_tokens_and_tracks_owners() {
		let mut tokens = BTreeMap::new();
		tokens.insert("alice".to_string(), vec!["tok1".to_string(), "".to_string()]);
		let (list, owners) = flatten(&tokens);
		assert_eq!(list, vec!["tok1".to_string()]);
		assert_eq!(owners.get("tok1").map(String::as_str), Some("alice"));
	}

	fn sample_tokens() -> BTreeMap<String, Vec<String>> {
		let mut tokens = BTreeMap::new();
		tokens.insert("alice".to_string(), vec!["tok-registered".to_string()]);
		tokens.insert("bob".to_string(), vec!["tok-unavailable".to_string()]);
		tokens.insert("carol".to_string(), vec!["tok-new".to_string()]);
		tokens
	}

	/// §8 scenario 5: one NotRegistered, one Unavailable, one registration_id.
	#[async_std::test]
	async fn scenario_2xx_splits_into_maintenance_and_retry() {
		let tokens = sample_tokens();
		let (token_list, user_by_token) = flatten(&tokens);

		let sender = MockPushSender::returning(PushResponse {
			status_code: 200,
			success: 1,
			fail: 2,
			retry_after: None,
			results: vec![
				TokenResult { registration_id: None, error: Some(error_tag::NOT_REGISTERED.to_string()) },
				TokenResult { registration_id: None, error: Some(error_tag::UNAVAILABLE.to_string()) },
				TokenResult { registration_id: Some("tok-new-2".to_string()), error: None },
			],
		});
		let request = PushRequest { server_key: "k".into(), tokens: token_list.clone(), notification: PushNotification::default(), data: BTreeMap::new() };
		let response = sender.send(request).await.unwrap();

		let decision = decide(&tokens, &token_list, &user_by_token, &response, 5);

		assert!(decision.early_return.is_none());
		let maintenance = decision.maintenance.expect("one removal and one update should enqueue maintenance");
		assert_eq!(maintenance.to_remove.len(), 1);
		assert_eq!(maintenance.to_remove[0].token, "tok-registered");
		assert_eq!(maintenance.to_update.len(), 1);
		assert_eq!(maintenance.to_update[0].new_token, "tok-new-2");

		let retry = decision.retry.expect("the Unavailable token should be queued for retry");
		assert_eq!(retry.tokens.get("bob"), Some(&vec!["tok-unavailable".to_string()]));
		assert_eq!(retry.delay_secs, 10);
	}

	/// §8 scenario 6: 400 is success with no retry and no maintenance.
	#[async_std::test]
	async fn scenario_400_drops_silently() {
		let tokens = sample_tokens();
		let (token_list, user_by_token) = flatten(&tokens);

		let sender = MockPushSender::returning(PushResponse { status_code: 400, success: 0, fail: 0, retry_after: None, results: Vec::new() });
		let request = PushRequest { server_key: "k".into(), tokens: token_list.clone(), notification: PushNotification::default(), data: BTreeMap::new() };
		let response = sender.send(request).await.unwrap();

		let decision = decide(&tokens, &token_list, &user_by_token, &response, 5);

		assert!(matches!(decision.early_return, Some(Ok(()))));
		assert!(decision.maintenance.is_none());
		assert!(decision.retry.is_none());
	}

	#[test]
	fn status_401_is_transient_and_retried_by_the_scheduler() {
		let tokens = sample_tokens();
		let (token_list, user_by_token) = flatten(&tokens);
		let response = PushResponse { status_code: 401, success: 0, fail: 0, retry_after: None, results: Vec::new() };

		let decision = decide(&tokens, &token_list, &user_by_token, &response, 5);

		assert!(matches!(decision.early_return, Some(Err(crate::error::CoreError::Transient(_)))));
	}

	/// A 503 isn't 400/401/2xx; the whole payload is retried rather than silently dropped.
	#[test]
	fn unhandled_status_retries_the_full_original_payload() {
		let tokens = sample_tokens();
		let (token_list, user_by_token) = flatten(&tokens);
		let response = PushResponse { status_code: 503, success: 0, fail: 0, retry_after: None, results: Vec::new() };

		let decision = decide(&tokens, &token_list, &user_by_token, &response, 5);

		assert!(decision.early_return.is_none());
		assert!(decision.maintenance.is_none());
		let retry = decision.retry.expect("a 503 should retry the whole payload");
		assert_eq!(retry.tokens, tokens);
	}
}

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

//! The phase resolver (§4.C): the state machine converting (phase, orders, readiness)
//! into (next phase, next phase states, possibly game end).

pub mod quitter;
pub mod transitions;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use hashbrown::HashSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PHASE_DEADLINE_MINUTES, MAX_TAIL_CALL_DEPTH};
use crate::env::CoreEnv;
use crate::error::{CoreError, Result};
use crate::notify::FanoutJob;
use crate::rules::PhaseDescriptor;
use crate::scheduler::{enqueue_at, Job};
use crate::store::models::{Game, GameResult, Phase, PhaseResult, PhaseState, Score};
use crate::store::queries;
use transitions::OldPhaseFacts;

/// The job the scheduler fires at a phase's deadline (§2, §4.C).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutResolveJob {
	pub game_id: i64,
	pub ordinal: i32,
}

#[async_trait]
impl Job for TimeoutResolveJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "timeout_resolve";

	async fn perform(self, env: &CoreEnv) -> Result<()> {
		act(env, self.game_id, self.ordinal, true).await
	}
}

/// Rating recomputation is an opaque collaborator's responsibility (out of scope, §1); the
/// core's job is only to guarantee the enqueue happens, per §4.C.10.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatingUpdateJob {
	pub game_id: i64,
}

#[async_trait]
impl Job for RatingUpdateJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "rating_update";

	async fn perform(self, _env: &CoreEnv) -> Result<()> {
		log::info!("rating update for game {} deferred to the rating service", self.game_id);
		Ok(())
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserStatsUpdateJob {
	pub game_id: i64,
	pub user_id: String,
}

#[async_trait]
impl Job for UserStatsUpdateJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "user_stats_update";

	async fn perform(self, _env: &CoreEnv) -> Result<()> {
		log::info!("stats update for user {} in game {} deferred to the stats service", self.user_id, self.game_id);
		Ok(())
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EjectProbationariesJob {
	pub game_id: i64,
	pub user_ids: Vec<String>,
}

#[async_trait]
impl Job for EjectProbationariesJob {
	type Environment = CoreEnv;
	const JOB_TYPE: &'static str = "eject_probationaries";

	async fn perform(self, _env: &CoreEnv) -> Result<()> {
		log::info!("ejection of {} probationary users from game {} deferred to the matchmaking service", self.user_ids.len(), self.game_id);
		Ok(())
	}
}

enum Outcome {
	Finished { game: Game, new_phase: Phase, members_with_options: HashSet<String> },
	Scheduled { game: Game, new_phase: Phase, members_with_options: HashSet<String> },
}

/// Entry point (§4.C): `Resolver.Act`, reimplemented as an explicit loop (§9) so tail-call
/// re-resolution never recurses. `non_eliminated_user_ids` is computed once and carried
/// across iterations so notifications always target the humans from the original phase.
pub async fn act(env: &CoreEnv, game_id: i64, ordinal: i32, timeout_triggered: bool) -> Result<()> {
	let mut tx = env.store.begin().await?;
	let mut ordinal = ordinal;
	let mut timeout_triggered = timeout_triggered;
	let mut non_eliminated_user_ids: Option<HashSet<String>> = None;
	let mut probation_user_ids: Vec<String> = Vec::new();
	let mut depth = 0u32;

	let outcome = loop {
		depth += 1;
		if depth > MAX_TAIL_CALL_DEPTH {
			return Err(CoreError::StructuralInvariant(format!("resolver tail-call depth exceeded {} at game {} phase {}", MAX_TAIL_CALL_DEPTH, game_id, ordinal)));
		}

		let mut game = queries::load_game(&mut tx, game_id).await?;
		let mut phase = queries::load_phase(&mut tx, game_id, ordinal).await?;
		let mut phase_states = queries::load_phase_states(&mut tx, game_id, ordinal).await?;

		// 4.C.1 preconditions
		if timeout_triggered && phase.deadline_at > Utc::now() {
			enqueue_at(&mut tx, phase.deadline_at, &TimeoutResolveJob { game_id, ordinal }).await?;
			tx.commit().await?;
			return Ok(());
		}
		if phase.resolved {
			tx.commit().await?;
			return Ok(());
		}

		// 4.C.2 cleanup
		for s in phase_states.iter_mut() {
			s.zipped_options = None;
		}
		queries::save_phase_states(&mut tx, game_id, ordinal, &phase_states).await?;

		if non_eliminated_user_ids.is_none() {
			let set = game
				.members
				.iter()
				.filter(|m| phase_states.iter().find(|s| s.nation == m.nation).map(|s| !s.eliminated).unwrap_or(true))
				.map(|m| m.user_id.clone())
				.collect();
			non_eliminated_user_ids = Some(set);
		}

		// 4.C.3 rules engine advance
		let variant = env.variants.get(&game.variant)?;
		let orders = queries::load_orders(&mut tx, game_id, ordinal).await?;
		let descriptor = PhaseDescriptor { season: parse_season(&phase.season)?, year: phase.year, phase_type: parse_phase_type(&phase.phase_type)? };
		let mut state = variant.load(descriptor, phase.units.clone(), phase.supply_centers.clone(), phase.dislodged.clone(), phase.dislodgers.clone(), phase.bounces.clone(), &orders)?;
		state.next()?;
		let dump = state.dump();
		let sc_counts = supply_center_counts(&dump.supply_centers);

		// 4.C.4 finalize old phase
		phase.resolutions = serde_json::to_value(&dump.resolutions)?;
		phase.resolved = true;
		phase.resolved_at = Some(Utc::now());
		queries::save_phase(&mut tx, &phase).await?;

		let new_descriptor = state.phase();
		let length_minutes = game.effective_phase_length_minutes(MAX_PHASE_DEADLINE_MINUTES);
		let new_ordinal = ordinal + 1;
		let created_at = Utc::now();
		let mut new_phase = Phase {
			game_id,
			ordinal: new_ordinal,
			season: format!("{:?}", new_descriptor.season),
			year: new_descriptor.year,
			phase_type: format!("{:?}", new_descriptor.phase_type),
			units: dump.units,
			supply_centers: dump.supply_centers,
			dislodged: dump.dislodged,
			dislodgers: dump.dislodgers,
			bounces: dump.bounces,
			resolutions: serde_json::json!({}),
			resolved: false,
			created_at,
			resolved_at: None,
			deadline_at: created_at + chrono::Duration::minutes(length_minutes),
			host: phase.host.clone(),
			scheme: phase.scheme.clone(),
		};

		// 4.C.5-4.C.7 per-member transition table, quitter state, result accumulation
		let mut new_phase_states = Vec::with_capacity(game.members.len());
		let mut ready_users = Vec::new();
		let mut active_users = Vec::new();
		let mut nmr_users = Vec::new();
		let mut all_users = Vec::new();
		let mut probationary_this_round = Vec::new();
		let mut dias_members = Vec::new();
		let mut dias_users = Vec::new();
		let mut nmr_members = Vec::new();
		let mut nmr_quitter_users = Vec::new();
		let mut eliminated_members = Vec::new();
		let mut eliminated_users = Vec::new();
		let mut members_with_options = HashSet::new();
		let mut quitter_count = 0usize;

		for member in &game.members {
			let old_state = phase_states.iter().find(|s| s.nation == member.nation);
			let had_orders = orders.iter().any(|o| o.nation == member.nation);
			let facts = OldPhaseFacts {
				had_orders,
				was_ready: old_state.map(|s| s.ready_to_resolve).unwrap_or(false),
				wanted_dias: old_state.map(|s| s.wants_dias).unwrap_or(false),
				was_on_probation: old_state.map(|s| s.on_probation).unwrap_or(false),
				was_eliminated: sc_counts.get(&member.nation).copied().unwrap_or(0) == 0,
			};

			let options = state.options(&member.nation);
			let new_options = options.leaf_count();
			if new_options > 0 {
				members_with_options.insert(member.user_id.clone());
			}
			let flags = transitions::derive(facts, new_options);

			if flags.auto_probation {
				probationary_this_round.push(member.user_id.clone());
			}

			match transitions::result_bucket(facts, flags.auto_probation) {
				transitions::ResultBucket::Nmr => nmr_users.push(member.user_id.clone()),
				transitions::ResultBucket::Ready => ready_users.push(member.user_id.clone()),
				transitions::ResultBucket::Active => active_users.push(member.user_id.clone()),
				transitions::ResultBucket::None => {}
			}
			all_users.push(member.user_id.clone());

			let qs = quitter::classify(facts.wanted_dias, facts.was_eliminated, flags.auto_probation);
			if qs.is_quitter() {
				quitter_count += 1;
			}
			match qs {
				quitter::QuitterState::Dias => {
					dias_members.push(member.nation.clone());
					dias_users.push(member.user_id.clone());
				}
				quitter::QuitterState::Nmr => {
					nmr_members.push(member.nation.clone());
					nmr_quitter_users.push(member.user_id.clone());
				}
				quitter::QuitterState::Eliminated => {
					eliminated_members.push(member.nation.clone());
					eliminated_users.push(member.user_id.clone());
				}
				quitter::QuitterState::None => {}
			}

			let mut next_state = PhaseState::blank(member.nation.clone());
			next_state.no_orders = new_options == 0 || facts.was_eliminated;
			next_state.ready_to_resolve = flags.auto_ready || facts.was_eliminated;
			next_state.wants_dias = flags.auto_dias && !facts.was_eliminated;
			next_state.on_probation = flags.auto_probation;
			next_state.eliminated = facts.was_eliminated;
			next_state.check_invariants()?;
			new_phase_states.push(next_state);
		}

		let phase_result = PhaseResult { ready_users, active_users, nmr_users, all_users: all_users.clone(), private: game.private };
		queries::save_phase_result(&mut tx, game_id, ordinal, &phase_result).await?;

		// 4.C.8 game-end decision
		let solo_winner = variant.solo_winner(state.as_ref());
		let nations_count = variant.nations().len();
		let game_ends = solo_winner.is_some() || quitter_count > nations_count.saturating_sub(1);

		if game_ends {
			new_phase.resolved = true;
			new_phase.resolved_at = Some(Utc::now());
			queries::insert_phase(&mut tx, &new_phase).await?;
			queries::save_phase_states(&mut tx, game_id, new_ordinal, &new_phase_states).await?;

			let scores: Vec<Score> = game
				.members
				.iter()
				.map(|m| Score { user_id: m.user_id.clone(), member: m.nation.clone(), scs: sc_counts.get(&m.nation).copied().unwrap_or(0) })
				.collect();
			let game_result = GameResult {
				solo_winner_member: solo_winner.clone().unwrap_or_default(),
				solo_winner_user: solo_winner.as_ref().and_then(|n| game.member_by_nation(n)).map(|m| m.user_id.clone()).unwrap_or_default(),
				dias_members,
				dias_users,
				nmr_members,
				nmr_users: nmr_quitter_users,
				eliminated_members,
				eliminated_users,
				scores,
				all_users,
				private: game.private,
				rated: false,
			};
			queries::save_game_result(&mut tx, game_id, &game_result).await?;

			game.finished = true;
			game.closed = true;
			game.newest_phase_meta = Some(new_phase.meta());
			queries::save_game(&mut tx, &game).await?;

			break Outcome::Finished { game, new_phase, members_with_options };
		}

		queries::insert_phase(&mut tx, &new_phase).await?;
		queries::save_phase_states(&mut tx, game_id, new_ordinal, &new_phase_states).await?;
		game.newest_phase_meta = Some(new_phase.meta());
		queries::save_game(&mut tx, &game).await?;

		let all_ready = new_phase_states.iter().all(|s| s.ready_to_resolve);
		probation_user_ids.extend(probationary_this_round);

		if all_ready {
			new_phase.deadline_at = Utc::now();
			queries::save_phase(&mut tx, &new_phase).await?;
			ordinal = new_ordinal;
			timeout_triggered = false;
			continue;
		}

		enqueue_at(&mut tx, new_phase.deadline_at, &TimeoutResolveJob { game_id, ordinal: new_ordinal }).await?;
		break Outcome::Scheduled { game, new_phase, members_with_options };
	};

	tx.commit().await?;

	let non_eliminated_user_ids = non_eliminated_user_ids.unwrap_or_default();
	match outcome {
		Outcome::Finished { game, new_phase, members_with_options } => {
			post_commit_fanout(env, &game, &new_phase, &non_eliminated_user_ids, &members_with_options, &probation_user_ids, true).await
		}
		Outcome::Scheduled { game, new_phase, members_with_options } => {
			post_commit_fanout(env, &game, &new_phase, &non_eliminated_user_ids, &members_with_options, &probation_user_ids, false).await
		}
	}
}

/// Post-commit fan-out (§4.C.10). Enqueue failures here are logged, not retried: they are
/// outside the resolved transaction, so a rare failure here can lose fan-out (§4.C.11).
#[allow(clippy::too_many_arguments)]
async fn post_commit_fanout(
	env: &CoreEnv,
	game: &Game,
	new_phase: &Phase,
	non_eliminated_user_ids: &HashSet<String>,
	members_with_options: &HashSet<String>,
	probation_user_ids: &[String],
	finished: bool,
) -> Result<()> {
	let recipients: Vec<(String, String)> = game
		.members
		.iter()
		.filter(|m| non_eliminated_user_ids.contains(&m.user_id) || members_with_options.contains(&m.user_id))
		.map(|m| (m.user_id.clone(), m.nation.clone()))
		.collect();

	if !recipients.is_empty() {
		let job = FanoutJob { host: new_phase.host.clone(), scheme: new_phase.scheme.clone(), game_id: game.id, ordinal: new_phase.ordinal, phase_meta: new_phase.meta(), recipients };
		if let Err(e) = enqueue_standalone(env, &job).await {
			log::error!("failed to enqueue notification fan-out for game {}: {}", game.id, e);
		}
	}

	if finished && !game.private {
		let job = RatingUpdateJob { game_id: game.id };
		if let Err(e) = enqueue_standalone(env, &job).await {
			log::error!("failed to enqueue rating update for game {}: {}", game.id, e);
		}
	}

	if !finished || game.private {
		for member in &game.members {
			let job = UserStatsUpdateJob { game_id: game.id, user_id: member.user_id.clone() };
			if let Err(e) = enqueue_standalone(env, &job).await {
				log::error!("failed to enqueue stats update for user {} in game {}: {}", member.user_id, game.id, e);
			}
		}
	}

	if !probation_user_ids.is_empty() {
		// A tail-called chain can put the same user on probation across more than one
		// phase; dedup so the ejection job doesn't see repeats.
		let user_ids: Vec<String> = probation_user_ids.iter().cloned().unique().collect();
		let job = EjectProbationariesJob { game_id: game.id, user_ids };
		if let Err(e) = enqueue_standalone(env, &job).await {
			log::error!("failed to enqueue probation ejection for game {}: {}", game.id, e);
		}
	}

	Ok(())
}

async fn enqueue_standalone<T: Job>(env: &CoreEnv, job: &T) -> Result<()> {
	let mut tx = env.store.begin().await?;
	enqueue_at(&mut tx, Utc::now(), job).await?;
	tx.commit().await?;
	Ok(())
}

fn supply_center_counts(supply_centers: &serde_json::Value) -> BTreeMap<String, i32> {
	let mut counts = BTreeMap::new();
	if let Some(map) = supply_centers.as_object() {
		for value in map.values() {
			if let Some(nation) = value.as_str() {
				*counts.entry(nation.to_string()).or_insert(0) += 1;
			}
		}
	}
	counts
}

fn parse_season(s: &str) -> Result<crate::rules::Season> {
	match s {
		"Spring" => Ok(crate::rules::Season::Spring),
		"Fall" => Ok(crate::rules::Season::Fall),
		"Winter" => Ok(crate::rules::Season::Winter),
		other => Err(CoreError::StructuralInvariant(format!("unknown season {}", other))),
	}
}

fn parse_phase_type(s: &str) -> Result<crate::rules::PhaseType> {
	match s {
		"Movement" => Ok(crate::rules::PhaseType::Movement),
		"Retreat" => Ok(crate::rules::PhaseType::Retreat),
		"Adjustment" => Ok(crate::rules::PhaseType::Adjustment),
		other => Err(CoreError::StructuralInvariant(format!("unknown phase type {}", other))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn supply_center_counts_tallies_by_nation() {
		let scs = serde_json::json!({"par": "France", "mar": "France", "lon": "England"});
		let counts = supply_center_counts(&scs);
		assert_eq!(counts.get("France"), Some(&2));
		assert_eq!(counts.get("England"), Some(&1));
		assert_eq!(counts.get("Germany"), None);
	}

	#[test]
	fn parse_season_round_trips_known_values() {
		assert!(matches!(parse_season("Spring").unwrap(), crate::rules::Season::Spring));
		assert!(parse_season("Summer").is_err());
	}
}

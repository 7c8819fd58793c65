// Copyright 2018-2021 Parity Technologies (UK) Ltd.
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

//! Free-function queries against one game's entity group (§4.A, §5).
//!
//! Every function here takes `&mut Transaction` so callers control the cross-group
//! transaction boundary explicitly, same as the resolver's single cross-group transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};

use crate::error::{CoreError, Result};
use crate::store::models::{Game, GameResult, Member, Order, Phase, PhaseMeta, PhaseResult, PhaseState, Score};

#[derive(FromRow)]
struct GameRecord {
	id: i64,
	variant: String,
	phase_length_minutes: i64,
	started: bool,
	finished: bool,
	closed: bool,
	private: bool,
	members: sqlx::types::Json<Vec<Member>>,
	newest_phase_meta: Option<sqlx::types::Json<PhaseMeta>>,
}

impl From<GameRecord> for Game {
	fn from(r: GameRecord) -> Self {
		Game {
			id: r.id,
			variant: r.variant,
			phase_length_minutes: r.phase_length_minutes,
			started: r.started,
			finished: r.finished,
			closed: r.closed,
			private: r.private,
			members: r.members.0,
			newest_phase_meta: r.newest_phase_meta.map(|j| j.0),
		}
	}
}

pub async fn load_game(tx: &mut Transaction<'_, Postgres>, game_id: i64) -> Result<Game> {
	let rec = sqlx::query_as::<_, GameRecord>(
		"SELECT id, variant, phase_length_minutes, started, finished, closed, private, members, newest_phase_meta \
		 FROM games WHERE id = $1 FOR UPDATE",
	)
	.bind(game_id)
	.fetch_optional(&mut **tx)
	.await?
	.ok_or_else(|| CoreError::StructuralInvariant(format!("no such game {}", game_id)))?;
	Ok(rec.into())
}

pub async fn save_game(tx: &mut Transaction<'_, Postgres>, game: &Game) -> Result<()> {
	sqlx::query(
		"UPDATE games SET variant = $2, phase_length_minutes = $3, started = $4, finished = $5, closed = $6, \
		 private = $7, members = $8, newest_phase_meta = $9 WHERE id = $1",
	)
	.bind(game.id)
	.bind(&game.variant)
	.bind(game.phase_length_minutes)
	.bind(game.started)
	.bind(game.finished)
	.bind(game.closed)
	.bind(game.private)
	.bind(sqlx::types::Json(&game.members))
	.bind(game.newest_phase_meta.as_ref().map(sqlx::types::Json))
	.execute(&mut **tx)
	.await?;
	Ok(())
}

#[derive(FromRow)]
struct PhaseRecord {
	game_id: i64,
	ordinal: i32,
	season: String,
	year: i32,
	phase_type: String,
	units: serde_json::Value,
	supply_centers: serde_json::Value,
	dislodged: serde_json::Value,
	dislodgers: serde_json::Value,
	bounces: serde_json::Value,
	resolutions: serde_json::Value,
	resolved: bool,
	created_at: DateTime<Utc>,
	resolved_at: Option<DateTime<Utc>>,
	deadline_at: DateTime<Utc>,
	host: String,
	scheme: String,
}

impl From<PhaseRecord> for Phase {
	fn from(r: PhaseRecord) -> Self {
		Phase {
			game_id: r.game_id,
			ordinal: r.ordinal,
			season: r.season,
			year: r.year,
			phase_type: r.phase_type,
			units: r.units,
			supply_centers: r.supply_centers,
			dislodged: r.dislodged,
			dislodgers: r.dislodgers,
			bounces: r.bounces,
			resolutions: r.resolutions,
			resolved: r.resolved,
			created_at: r.created_at,
			resolved_at: r.resolved_at,
			deadline_at: r.deadline_at,
			host: r.host,
			scheme: r.scheme,
		}
	}
}

pub async fn load_phase(tx: &mut Transaction<'_, Postgres>, game_id: i64, ordinal: i32) -> Result<Phase> {
	let rec = sqlx::query_as::<_, PhaseRecord>(
		"SELECT game_id, ordinal, season, year, phase_type, units, supply_centers, dislodged, dislodgers, \
		 bounces, resolutions, resolved, created_at, resolved_at, deadline_at, host, scheme \
		 FROM phases WHERE game_id = $1 AND ordinal = $2 FOR UPDATE",
	)
	.bind(game_id)
	.bind(ordinal)
	.fetch_optional(&mut **tx)
	.await?
	.ok_or_else(|| CoreError::StructuralInvariant(format!("no such phase ({}, {})", game_id, ordinal)))?;
	Ok(rec.into())
}

pub async fn insert_phase(tx: &mut Transaction<'_, Postgres>, phase: &Phase) -> Result<()> {
	sqlx::query(
		"INSERT INTO phases (game_id, ordinal, season, year, phase_type, units, supply_centers, dislodged, \
		 dislodgers, bounces, resolutions, resolved, created_at, resolved_at, deadline_at, host, scheme) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)",
	)
	.bind(phase.game_id)
	.bind(phase.ordinal)
	.bind(&phase.season)
	.bind(phase.year)
	.bind(&phase.phase_type)
	.bind(&phase.units)
	.bind(&phase.supply_centers)
	.bind(&phase.dislodged)
	.bind(&phase.dislodgers)
	.bind(&phase.bounces)
	.bind(&phase.resolutions)
	.bind(phase.resolved)
	.bind(phase.created_at)
	.bind(phase.resolved_at)
	.bind(phase.deadline_at)
	.bind(&phase.host)
	.bind(&phase.scheme)
	.execute(&mut **tx)
	.await?;
	Ok(())
}

pub async fn save_phase(tx: &mut Transaction<'_, Postgres>, phase: &Phase) -> Result<()> {
	sqlx::query(
		"UPDATE phases SET resolutions = $3, resolved = $4, resolved_at = $5, deadline_at = $6 \
		 WHERE game_id = $1 AND ordinal = $2",
	)
	.bind(phase.game_id)
	.bind(phase.ordinal)
	.bind(&phase.resolutions)
	.bind(phase.resolved)
	.bind(phase.resolved_at)
	.bind(phase.deadline_at)
	.execute(&mut **tx)
	.await?;
	Ok(())
}

#[derive(FromRow)]
struct PhaseStateRecord {
	nation: String,
	ready_to_resolve: bool,
	wants_dias: bool,
	on_probation: bool,
	eliminated: bool,
	no_orders: bool,
	zipped_options: Option<Vec<u8>>,
	note: String,
}

impl From<PhaseStateRecord> for PhaseState {
	fn from(r: PhaseStateRecord) -> Self {
		PhaseState {
			nation: r.nation,
			ready_to_resolve: r.ready_to_resolve,
			wants_dias: r.wants_dias,
			on_probation: r.on_probation,
			eliminated: r.eliminated,
			no_orders: r.no_orders,
			zipped_options: r.zipped_options,
			note: r.note,
		}
	}
}

pub async fn load_phase_states(tx: &mut Transaction<'_, Postgres>, game_id: i64, ordinal: i32) -> Result<Vec<PhaseState>> {
	let recs = sqlx::query_as::<_, PhaseStateRecord>(
		"SELECT nation, ready_to_resolve, wants_dias, on_probation, eliminated, no_orders, zipped_options, note \
		 FROM phase_states WHERE game_id = $1 AND ordinal = $2 FOR UPDATE",
	)
	.bind(game_id)
	.bind(ordinal)
	.fetch_all(&mut **tx)
	.await?;
	Ok(recs.into_iter().map(Into::into).collect())
}

/// Bulk-persists phase states in one round trip per row; caller (the resolver's cleanup
/// step, §4.C.2) has already cleared `zipped_options` on resolved phases.
pub async fn save_phase_states(tx: &mut Transaction<'_, Postgres>, game_id: i64, ordinal: i32, states: &[PhaseState]) -> Result<()> {
	for s in states {
		sqlx::query(
			"INSERT INTO phase_states (game_id, ordinal, nation, ready_to_resolve, wants_dias, on_probation, \
			 eliminated, no_orders, zipped_options, note) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10) \
			 ON CONFLICT (game_id, ordinal, nation) DO UPDATE SET \
			 ready_to_resolve = EXCLUDED.ready_to_resolve, wants_dias = EXCLUDED.wants_dias, \
			 on_probation = EXCLUDED.on_probation, eliminated = EXCLUDED.eliminated, \
			 no_orders = EXCLUDED.no_orders, zipped_options = EXCLUDED.zipped_options, note = EXCLUDED.note",
		)
		.bind(game_id)
		.bind(ordinal)
		.bind(&s.nation)
		.bind(s.ready_to_resolve)
		.bind(s.wants_dias)
		.bind(s.on_probation)
		.bind(s.eliminated)
		.bind(s.no_orders)
		.bind(&s.zipped_options)
		.bind(&s.note)
		.execute(&mut **tx)
		.await?;
	}
	Ok(())
}

#[derive(FromRow)]
struct OrderRecord {
	nation: String,
	parts: sqlx::types::Json<Vec<String>>,
}

pub async fn load_orders(tx: &mut Transaction<'_, Postgres>, game_id: i64, ordinal: i32) -> Result<Vec<Order>> {
	let recs = sqlx::query_as::<_, OrderRecord>("SELECT nation, parts FROM orders WHERE game_id = $1 AND ordinal = $2")
		.bind(game_id)
		.bind(ordinal)
		.fetch_all(&mut **tx)
		.await?;
	Ok(recs.into_iter().map(|r| Order { nation: r.nation, parts: r.parts.0 }).collect())
}

pub async fn save_phase_result(tx: &mut Transaction<'_, Postgres>, game_id: i64, ordinal: i32, result: &PhaseResult) -> Result<()> {
	sqlx::query(
		"INSERT INTO phase_results (game_id, ordinal, ready_users, active_users, nmr_users, all_users, private) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7) \
		 ON CONFLICT (game_id, ordinal) DO UPDATE SET ready_users = EXCLUDED.ready_users, \
		 active_users = EXCLUDED.active_users, nmr_users = EXCLUDED.nmr_users, all_users = EXCLUDED.all_users, \
		 private = EXCLUDED.private",
	)
	.bind(game_id)
	.bind(ordinal)
	.bind(sqlx::types::Json(&result.ready_users))
	.bind(sqlx::types::Json(&result.active_users))
	.bind(sqlx::types::Json(&result.nmr_users))
	.bind(sqlx::types::Json(&result.all_users))
	.bind(result.private)
	.execute(&mut **tx)
	.await?;
	Ok(())
}

#[derive(FromRow)]
struct GameResultRecord {
	solo_winner_member: String,
	solo_winner_user: String,
	dias_members: sqlx::types::Json<Vec<String>>,
	dias_users: sqlx::types::Json<Vec<String>>,
	nmr_members: sqlx::types::Json<Vec<String>>,
	nmr_users: sqlx::types::Json<Vec<String>>,
	eliminated_members: sqlx::types::Json<Vec<String>>,
	eliminated_users: sqlx::types::Json<Vec<String>>,
	scores: sqlx::types::Json<Vec<Score>>,
	all_users: sqlx::types::Json<Vec<String>>,
	private: bool,
	rated: bool,
}

pub async fn load_game_result(tx: &mut Transaction<'_, Postgres>, game_id: i64) -> Result<Option<GameResult>> {
	let rec = sqlx::query_as::<_, GameResultRecord>(
		"SELECT solo_winner_member, solo_winner_user, dias_members, dias_users, nmr_members, nmr_users, \
		 eliminated_members, eliminated_users, scores, all_users, private, rated FROM game_results WHERE game_id = $1",
	)
	.bind(game_id)
	.fetch_optional(&mut **tx)
	.await?;
	Ok(rec.map(|r| GameResult {
		solo_winner_member: r.solo_winner_member,
		solo_winner_user: r.solo_winner_user,
		dias_members: r.dias_members.0,
		dias_users: r.dias_users.0,
		nmr_members: r.nmr_members.0,
		nmr_users: r.nmr_users.0,
		eliminated_members: r.eliminated_members.0,
		eliminated_users: r.eliminated_users.0,
		scores: r.scores.0,
		all_users: r.all_users.0,
		private: r.private,
		rated: r.rated,
	}))
}

pub async fn save_game_result(tx: &mut Transaction<'_, Postgres>, game_id: i64, result: &GameResult) -> Result<()> {
	sqlx::query(
		"INSERT INTO game_results (game_id, solo_winner_member, solo_winner_user, dias_members, dias_users, \
		 nmr_members, nmr_users, eliminated_members, eliminated_users, scores, all_users, private, rated) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
		 ON CONFLICT (game_id) DO UPDATE SET solo_winner_member = EXCLUDED.solo_winner_member, \
		 solo_winner_user = EXCLUDED.solo_winner_user, dias_members = EXCLUDED.dias_members, \
		 dias_users = EXCLUDED.dias_users, nmr_members = EXCLUDED.nmr_members, nmr_users = EXCLUDED.nmr_users, \
		 eliminated_members = EXCLUDED.eliminated_members, eliminated_users = EXCLUDED.eliminated_users, \
		 scores = EXCLUDED.scores, all_users = EXCLUDED.all_users, private = EXCLUDED.private, rated = EXCLUDED.rated",
	)
	.bind(game_id)
	.bind(&result.solo_winner_member)
	.bind(&result.solo_winner_user)
	.bind(sqlx::types::Json(&result.dias_members))
	.bind(sqlx::types::Json(&result.dias_users))
	.bind(sqlx::types::Json(&result.nmr_members))
	.bind(sqlx::types::Json(&result.nmr_users))
	.bind(sqlx::types::Json(&result.eliminated_members))
	.bind(sqlx::types::Json(&result.eliminated_users))
	.bind(sqlx::types::Json(&result.scores))
	.bind(sqlx::types::Json(&result.all_users))
	.bind(result.private)
	.bind(result.rated)
	.execute(&mut **tx)
	.await?;
	Ok(())
}

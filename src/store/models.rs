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

//! Domain models (§3). JSONB columns round-trip through `sqlx::types::Json<T>` at the
//! query layer (`store::queries`) so these types stay free of storage concerns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
	pub nation: String,
	pub user_id: String,
	pub newest_phase_state: Option<PhaseState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
	pub id: i64,
	pub variant: String,
	pub phase_length_minutes: i64,
	pub started: bool,
	pub finished: bool,
	pub closed: bool,
	pub private: bool,
	pub members: Vec<Member>,
	pub newest_phase_meta: Option<PhaseMeta>,
}

impl Game {
	/// Falls back to the configured ceiling when the game carries a legacy zero length (§4.C.4).
	pub fn effective_phase_length_minutes(&self, fallback_minutes: i64) -> i64 {
		if self.phase_length_minutes == 0 {
			fallback_minutes
		} else {
			self.phase_length_minutes
		}
	}

	pub fn member_by_nation(&self, nation: &str) -> Option<&Member> {
		self.members.iter().find(|m| m.nation == nation)
	}
}

/// Small summary cached on the Game so list views need not load the latest Phase.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseMeta {
	pub ordinal: i32,
	pub season: String,
	pub year: i32,
	pub phase_type: String,
	pub resolved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Phase {
	pub game_id: i64,
	pub ordinal: i32,
	pub season: String,
	pub year: i32,
	pub phase_type: String,
	pub units: serde_json::Value,
	pub supply_centers: serde_json::Value,
	pub dislodged: serde_json::Value,
	pub dislodgers: serde_json::Value,
	pub bounces: serde_json::Value,
	pub resolutions: serde_json::Value,
	pub resolved: bool,
	pub created_at: DateTime<Utc>,
	pub resolved_at: Option<DateTime<Utc>>,
	pub deadline_at: DateTime<Utc>,
	pub host: String,
	pub scheme: String,
}

impl Phase {
	pub fn key(&self) -> crate::store::keys::PhaseKey {
		crate::store::keys::PhaseKey::new(self.game_id, self.ordinal)
	}

	pub fn meta(&self) -> PhaseMeta {
		PhaseMeta {
			ordinal: self.ordinal,
			season: self.season.clone(),
			year: self.year,
			phase_type: self.phase_type.clone(),
			resolved: self.resolved,
		}
	}

	/// Recomputes the indexed display snapshots carried alongside the persisted phase (§4.A).
	///
	/// The persisted row omits these; callers reconstitute them on read from the same
	/// `units`/`supply_centers` values so indexed queries never drift from the canonical state.
	pub fn recalc(&self) -> crate::error::Result<RecalcSnapshot> {
		Ok(RecalcSnapshot {
			units_json: serde_json::to_string(&self.units)?,
			supply_centers_json: serde_json::to_string(&self.supply_centers)?,
		})
	}
}

/// Output of [`Phase::recalc`]: JSON strings used only for indexed display, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecalcSnapshot {
	pub units_json: String,
	pub supply_centers_json: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseState {
	pub nation: String,
	pub ready_to_resolve: bool,
	pub wants_dias: bool,
	pub on_probation: bool,
	pub eliminated: bool,
	pub no_orders: bool,
	pub zipped_options: Option<Vec<u8>>,
	pub note: String,
}

impl PhaseState {
	pub fn blank(nation: impl Into<String>) -> Self {
		Self {
			nation: nation.into(),
			ready_to_resolve: false,
			wants_dias: false,
			on_probation: false,
			eliminated: false,
			no_orders: false,
			zipped_options: None,
			note: String::new(),
		}
	}

	/// §3 invariants: elimination implies off-probation and no-orders; no-orders implies ready.
	pub fn check_invariants(&self) -> crate::error::Result<()> {
		if self.eliminated && (self.on_probation || !self.no_orders) {
			return Err(crate::error::CoreError::StructuralInvariant(format!(
				"phase state for {} violates eliminated => !on_probation && no_orders",
				self.nation
			)));
		}
		if self.no_orders && !self.ready_to_resolve {
			return Err(crate::error::CoreError::StructuralInvariant(format!("phase state for {} violates no_orders => ready_to_resolve", self.nation)));
		}
		Ok(())
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
	pub nation: String,
	/// `parts[0]` is the source province; the tail carries move parameters.
	pub parts: Vec<String>,
}

impl Order {
	pub fn source_province(&self) -> Option<&str> {
		self.parts.first().map(String::as_str)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PhaseResult {
	pub ready_users: Vec<String>,
	pub active_users: Vec<String>,
	pub nmr_users: Vec<String>,
	pub all_users: Vec<String>,
	pub private: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Score {
	pub user_id: String,
	pub member: String,
	pub scs: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GameResult {
	pub solo_winner_member: String,
	pub solo_winner_user: String,
	pub dias_members: Vec<String>,
	pub dias_users: Vec<String>,
	pub nmr_members: Vec<String>,
	pub nmr_users: Vec<String>,
	pub eliminated_members: Vec<String>,
	pub eliminated_users: Vec<String>,
	pub scores: Vec<Score>,
	pub all_users: Vec<String>,
	pub private: bool,
	pub rated: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn eliminated_implies_no_probation_and_no_orders() {
		let mut s = PhaseState::blank("France");
		s.eliminated = true;
		s.no_orders = true;
		assert!(s.check_invariants().is_ok());

		s.on_probation = true;
		assert!(s.check_invariants().is_err());
	}

	#[test]
	fn no_orders_implies_ready() {
		let mut s = PhaseState::blank("Germany");
		s.no_orders = true;
		assert!(s.check_invariants().is_err());
		s.ready_to_resolve = true;
		assert!(s.check_invariants().is_ok());
	}

	#[test]
	fn effective_phase_length_falls_back_on_legacy_zero() {
		let g = Game {
			id: 1,
			variant: "classical".into(),
			phase_length_minutes: 0,
			started: true,
			finished: false,
			closed: false,
			private: false,
			members: vec![],
			newest_phase_meta: None,
		};
		assert_eq!(g.effective_phase_length_minutes(1440), 1440);
	}
}

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

//! Key derivation for phases and phase-states, mirroring `phaseKey(gameID, ordinal) =
//! child(gameID, "Phase", ordinal)` with phase-state keys named by nation underneath.

/// Identifies one phase within one game. `ordinal` is 1-based and dense.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhaseKey {
	pub game_id: i64,
	pub ordinal: i32,
}

impl PhaseKey {
	pub fn new(game_id: i64, ordinal: i32) -> Self {
		debug_assert!(ordinal >= 1, "ordinal must be >= 1");
		Self { game_id, ordinal }
	}
}

/// Identifies one nation's state within one phase.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhaseStateKey {
	pub game_id: i64,
	pub ordinal: i32,
	pub nation: String,
}

impl PhaseStateKey {
	pub fn new(phase: PhaseKey, nation: impl Into<String>) -> Self {
		Self { game_id: phase.game_id, ordinal: phase.ordinal, nation: nation.into() }
	}

	pub fn phase(&self) -> PhaseKey {
		PhaseKey::new(self.game_id, self.ordinal)
	}
}

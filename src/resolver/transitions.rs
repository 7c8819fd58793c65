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

//! Per-member transition table (§4.C.5) and old-phase result accumulation (§4.C.7).

/// The five booleans the transition table is derived from, read off the just-resolved phase.
#[derive(Copy, Clone, Debug, Default)]
pub struct OldPhaseFacts {
	pub had_orders: bool,
	pub was_ready: bool,
	pub wanted_dias: bool,
	pub was_on_probation: bool,
	pub was_eliminated: bool,
}

/// Derived flags governing the member's state in the newly created phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NextPhaseFlags {
	pub auto_probation: bool,
	pub auto_ready: bool,
	pub auto_dias: bool,
}

/// `newOptions` is `|options(newPhase, nation)|`, the new phase's legal-order count.
pub fn derive(facts: OldPhaseFacts, new_options: usize) -> NextPhaseFlags {
	let auto_probation = (facts.was_on_probation || (!facts.had_orders && !facts.was_ready)) && !facts.was_eliminated;
	let auto_ready = new_options == 0 || auto_probation;
	let auto_dias = facts.wanted_dias || auto_probation;
	NextPhaseFlags { auto_probation, auto_ready, auto_dias }
}

/// Which of the mutually-exclusive result buckets a member falls into (§4.C.7). Priority:
/// `auto_probation` beats `was_ready` beats `had_orders`; every member lands in `all_users`
/// regardless of the other three.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultBucket {
	Nmr,
	Ready,
	Active,
	None,
}

pub fn result_bucket(facts: OldPhaseFacts, auto_probation: bool) -> ResultBucket {
	if auto_probation {
		ResultBucket::Nmr
	} else if facts.was_ready {
		ResultBucket::Ready
	} else if facts.had_orders {
		ResultBucket::Active
	} else {
		ResultBucket::None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_orders_and_not_ready_triggers_probation() {
		let facts = OldPhaseFacts { had_orders: false, was_ready: false, ..Default::default() };
		let flags = derive(facts, 5);
		assert!(flags.auto_probation);
		assert!(flags.auto_dias);
	}

	#[test]
	fn elimination_blocks_probation_even_if_inactive() {
		let facts = OldPhaseFacts { had_orders: false, was_ready: false, was_eliminated: true, ..Default::default() };
		let flags = derive(facts, 5);
		assert!(!flags.auto_probation);
	}

	#[test]
	fn no_legal_moves_forces_auto_ready() {
		let facts = OldPhaseFacts { had_orders: true, was_ready: false, ..Default::default() };
		let flags = derive(facts, 0);
		assert!(flags.auto_ready);
		assert!(!flags.auto_probation);
	}

	#[test]
	fn probation_already_set_persists() {
		let facts = OldPhaseFacts { had_orders: true, was_ready: true, was_on_probation: true, ..Default::default() };
		let flags = derive(facts, 3);
		assert!(flags.auto_probation);
	}

	#[test]
	fn dias_request_carries_forward() {
		let facts = OldPhaseFacts { had_orders: true, was_ready: true, wanted_dias: true, ..Default::default() };
		let flags = derive(facts, 3);
		assert!(flags.auto_dias);
		assert!(!flags.auto_probation);
	}

	#[test]
	fn result_bucket_priority_is_probation_then_ready_then_active() {
		let facts = OldPhaseFacts { had_orders: true, was_ready: true, ..Default::default() };
		assert_eq!(result_bucket(facts, true), ResultBucket::Nmr);
		assert_eq!(result_bucket(facts, false), ResultBucket::Ready);

		let facts = OldPhaseFacts { had_orders: true, was_ready: false, ..Default::default() };
		assert_eq!(result_bucket(facts, false), ResultBucket::Active);

		let facts = OldPhaseFacts::default();
		assert_eq!(result_bucket(facts, false), ResultBucket::None);
	}
}

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

//! The rules engine contract (§6): treated as an opaque collaborator. A `Variant`
//! constructs blank `State`s and parses orders; a `State` advances one phase in place.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::OptionNode;
use crate::store::models::Order;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
	Spring,
	Fall,
	Winter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseType {
	Movement,
	Retreat,
	Adjustment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDescriptor {
	pub season: Season,
	pub year: i32,
	pub phase_type: PhaseType,
}

/// The board snapshot and resolution text a `State` dumps after `Next()` (§6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateDump {
	pub units: serde_json::Value,
	pub supply_centers: serde_json::Value,
	pub dislodged: serde_json::Value,
	pub dislodgers: serde_json::Value,
	pub bounces: serde_json::Value,
	pub resolutions: BTreeMap<String, String>,
}

/// An order keyed by `(nation, sourceProvince)`, parsed and validated by the variant.
#[derive(Clone, Debug)]
pub struct ParsedOrder {
	pub nation: String,
	pub source_province: String,
	pub parts: Vec<String>,
}

/// One nation's in-progress game state, loaded from a phase snapshot plus its orders.
///
/// `Next` mutates in place (§6); implementations are expected to be deterministic and
/// side-effect-free beyond that mutation.
#[async_trait]
pub trait State: Send {
	fn phase(&self) -> PhaseDescriptor;

	/// Advances the state by one phase, resolving orders already loaded via construction.
	fn next(&mut self) -> Result<()>;

	fn dump(&self) -> StateDump;

	/// Maps each province to the nation occupying it with a supply center, if any.
	fn supply_centers(&self) -> BTreeMap<String, String>;

	fn resolutions(&self) -> BTreeMap<String, String>;

	/// The legal-order decision tree for one nation in this state (§4.B, §9).
	fn options(&self, nation: &str) -> OptionNode;
}

/// A ruleset for one game variant (§6): constructs blank/loaded `State`s and parses orders.
#[async_trait]
pub trait Variant: Send + Sync {
	fn name(&self) -> &str;

	/// The nation seats this variant defines, in a stable order.
	fn nations(&self) -> &[String];

	fn blank(&self, phase: PhaseDescriptor) -> Result<Box<dyn State>>;

	#[allow(clippy::too_many_arguments)]
	fn load(
		&self,
		phase: PhaseDescriptor,
		units: serde_json::Value,
		supply_centers: serde_json::Value,
		dislodged: serde_json::Value,
		dislodgers: serde_json::Value,
		bounces: serde_json::Value,
		orders: &[Order],
	) -> Result<Box<dyn State>>;

	/// The nation that reached the solo-victory threshold, if any (§4.C.8).
	fn solo_winner(&self, state: &dyn State) -> Option<String>;

	/// Parses raw per-nation order parts into validated orders; rejects malformed orders.
	fn parse_all(&self, order_map: &BTreeMap<String, Vec<Order>>) -> Result<Vec<ParsedOrder>>;
}

/// Looks up the variant a game was created with by name, as stored on `Game::variant`.
#[derive(Default)]
pub struct VariantRegistry {
	variants: BTreeMap<String, std::sync::Arc<dyn Variant>>,
}

impl VariantRegistry {
	pub fn new() -> Self {
		Self { variants: BTreeMap::new() }
	}

	pub fn register(mut self, variant: std::sync::Arc<dyn Variant>) -> Self {
		self.variants.insert(variant.name().to_string(), variant);
		self
	}

	pub fn get(&self, name: &str) -> Result<std::sync::Arc<dyn Variant>> {
		self.variants.get(name).cloned().ok_or_else(|| crate::error::CoreError::StructuralInvariant(format!("unknown variant {}", name)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn phase_descriptor_round_trips_through_json() {
		let d = PhaseDescriptor { season: Season::Fall, year: 1901, phase_type: PhaseType::Retreat };
		let json = serde_json::to_string(&d).unwrap();
		let back: PhaseDescriptor = serde_json::from_str(&json).unwrap();
		assert_eq!(d, back);
	}
}

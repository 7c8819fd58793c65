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

//! Options codec (§4.B): compresses the per-nation order-option tree for storage on a
//! `PhaseState`, and decompresses it back on read.

use std::io::prelude::*;

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A heterogeneous decision-tree node describing legal orders for one nation (§9).
///
/// The codec only transports opaque JSON; this tagged shape is a convenience for code
/// that wants to walk the tree without going through raw `serde_json::Value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionNode {
	pub kind: OptionKind,
	pub value: String,
	#[serde(default)]
	pub next: Vec<OptionNode>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OptionKind {
	Province,
	OrderType,
	UnitType,
	SrcProvince,
}

impl OptionNode {
	/// Number of terminal (leaf) choices reachable from this node, used by the resolver's
	/// `newOptions` computation (§4.C.5).
	pub fn leaf_count(&self) -> usize {
		if self.next.is_empty() {
			1
		} else {
			self.next.iter().map(OptionNode::leaf_count).sum()
		}
	}
}

/// Compresses any JSON-serializable option tree to bytes suitable for `zipped_options`.
pub fn zip_options<T: Serialize>(value: &T) -> Result<Vec<u8>> {
	let json = serde_json::to_vec(value)?;
	let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(&json)?;
	Ok(encoder.finish()?)
}

/// Decompresses bytes produced by [`zip_options`] back into the original value.
///
/// Corruption is reported as a [`CoreError::PermanentPayload`] so callers can regenerate
/// and save rather than retry (§4.B, §7).
pub fn unzip_options<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
	let mut decoder = ZlibDecoder::new(bytes);
	let mut buf = Vec::new();
	decoder.read_to_end(&mut buf).map_err(|e| CoreError::PermanentPayload(format!("corrupted zipped options: {}", e)))?;
	serde_json::from_slice(&buf).map_err(|e| CoreError::PermanentPayload(format!("corrupted zipped options: {}", e)))
}

/// Decodes `zipped_options`, tolerating absence or corruption by returning `None` instead
/// of an error so the caller can regenerate the tree from the rules engine (§4.B).
pub fn unzip_options_lenient<T: for<'de> Deserialize<'de>>(bytes: Option<&[u8]>) -> Option<T> {
	bytes.and_then(|b| unzip_options(b).ok())
}

/// Compresses `{type:"phase", gameID, phaseMeta}` for the push data payload envelope (§6).
pub fn zip_phase_payload(game_id: i64, phase_meta: &crate::store::models::PhaseMeta) -> Result<Vec<u8>> {
	#[derive(Serialize)]
	struct Envelope<'a> {
		#[serde(rename = "type")]
		kind: &'static str,
		#[serde(rename = "gameID")]
		game_id: i64,
		#[serde(rename = "phaseMeta")]
		phase_meta: &'a crate::store::models::PhaseMeta,
	}
	zip_options(&Envelope { kind: "phase", game_id, phase_meta })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_tree() -> OptionNode {
		OptionNode {
			kind: OptionKind::Province,
			value: "par".into(),
			next: vec![
				OptionNode { kind: OptionKind::OrderType, value: "Move".into(), next: vec![] },
				OptionNode { kind: OptionKind::OrderType, value: "Hold".into(), next: vec![] },
			],
		}
	}

	#[test]
	fn zip_then_unzip_round_trips() {
		let tree = sample_tree();
		let bytes = zip_options(&tree).unwrap();
		let back: OptionNode = unzip_options(&bytes).unwrap();
		assert_eq!(tree, back);
	}

	#[test]
	fn zip_then_unzip_round_trips_arbitrary_json() {
		let value = serde_json::json!({"a": [1, 2, 3], "b": {"c": null}});
		let bytes = zip_options(&value).unwrap();
		let back: serde_json::Value = unzip_options(&bytes).unwrap();
		assert_eq!(value, back);
	}

	#[test]
	fn corrupted_bytes_are_permanent_payload_errors() {
		let err = unzip_options::<OptionNode>(&[1, 2, 3, 4]).unwrap_err();
		assert!(matches!(err, CoreError::PermanentPayload(_)));
	}

	#[test]
	fn lenient_decode_tolerates_absence_and_corruption() {
		assert!(unzip_options_lenient::<OptionNode>(None).is_none());
		assert!(unzip_options_lenient::<OptionNode>(Some(&[9, 9, 9])).is_none());
	}

	#[test]
	fn leaf_count_counts_terminal_nodes() {
		assert_eq!(sample_tree().leaf_count(), 2);
		let leaf = OptionNode { kind: OptionKind::SrcProvince, value: "x".into(), next: vec![] };
		assert_eq!(leaf.leaf_count(), 1);
	}
}

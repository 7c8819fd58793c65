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

#![forbid(unsafe_code)]

//! `turnresolve-core`: the turn-resolution engine driving a play-by-cloud Diplomacy-style
//! game service. A Postgres-backed store holds one entity group per game; a durable
//! scheduler drives phase timeouts and notification fan-out; the rules engine itself is
//! an opaque, pluggable collaborator (§6).

pub mod config;
pub mod env;
mod error;
mod logger;
pub mod notify;
pub mod options;
pub mod push;
pub mod resolver;
pub mod rules;
pub mod scheduler;
pub mod store;
mod util;
pub mod userconfig;

pub use self::config::ControlConfig;
pub use self::env::CoreEnv;
pub use self::error::{CoreError, Result};
pub use self::logger::init as init_logger;
pub use self::store::{DatabaseConfig, Store};

/// Get the path to a local directory where the service can save logs.
pub fn turnresolve_default_dir() -> std::path::PathBuf {
	util::local_dir().expect("invalid home directory path")
}

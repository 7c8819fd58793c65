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

//! The shared environment every job runs with: the store, control knobs, and handles to
//! the opaque collaborators (rules engine variants, mail sender, push sender).

use std::sync::Arc;

use crate::config::ControlConfig;
use crate::notify::mail::Mailer;
use crate::push::sender::PushSender;
use crate::rules::VariantRegistry;
use crate::scheduler::Registry;
use crate::store::Store;
use crate::userconfig::UserConfigStore;

#[derive(Clone)]
pub struct CoreEnv {
	pub store: Store,
	pub control: ControlConfig,
	pub variants: Arc<VariantRegistry>,
	pub mailer: Arc<dyn Mailer>,
	pub push_sender: Arc<dyn PushSender>,
	pub user_config: Arc<dyn UserConfigStore>,
}

impl CoreEnv {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		store: Store,
		control: ControlConfig,
		variants: VariantRegistry,
		mailer: Arc<dyn Mailer>,
		push_sender: Arc<dyn PushSender>,
		user_config: Arc<dyn UserConfigStore>,
	) -> Self {
		Self { store, control, variants: Arc::new(variants), mailer, push_sender, user_config }
	}
}

/// Registers every job type the core defines against a fresh [`Registry`].
pub fn build_registry() -> Registry<CoreEnv> {
	Registry::new()
		.register::<crate::resolver::TimeoutResolveJob>()
		.register::<crate::notify::FanoutJob>()
		.register::<crate::notify::mail::MailJob>()
		.register::<crate::notify::push::SendPhaseNotificationToFcmJob>()
		.register::<crate::push::dispatch::FcmSendToTokensJob>()
		.register::<crate::push::maintenance::ManageFcmTokensJob>()
		.register::<crate::resolver::RatingUpdateJob>()
		.register::<crate::resolver::UserStatsUpdateJob>()
		.register::<crate::resolver::EjectProbationariesJob>()
}

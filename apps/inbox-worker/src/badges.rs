//! Daily agent badge evaluation.

use serde_json::Value;
use time::{Duration, OffsetDateTime, Time};

use inbox_domain::badges::{self, Badge, TimelineMessage};
use inbox_storage::{
	badges::{self as badge_store, AwardedBadge},
	messages,
	models::AgentProfile,
};

use crate::{Result, scheduler::WorkerState};

pub const PROFILE_BATCH: i64 = 100;
pub const RECENT_RATINGS: i64 = 30;
pub const SHIFT_LOOKBACK: Duration = Duration::days(30);
pub const TIMELINE_LOOKBACK: Duration = Duration::hours(24);

/// Awards every badge an agent qualifies for today. Returns the number of new badges.
pub async fn evaluate_badges(state: &WorkerState, now: OffsetDateTime) -> Result<usize> {
	let profiles = badge_store::list_profiles(&state.db, PROFILE_BATCH).await?;
	let mut awarded = 0;

	for profile in &profiles {
		let earned = badge_store::earned_on(&state.db, profile.tenant_id, profile.user_id, now.date())
			.await?;

		for badge in Badge::ALL {
			if earned.iter().any(|key| key == badge.key()) {
				continue;
			}

			let Some(metadata) = qualify(state, profile, badge, now).await? else {
				continue;
			};
			let record = AwardedBadge { key: badge.key(), name: badge.display_name(), metadata: &metadata };

			if badge_store::award(&state.db, profile.tenant_id, profile.user_id, &record, now).await? {
				awarded += 1;

				tracing::info!(user_id = %profile.user_id, badge = badge.key(), "Badge awarded.");
			}
		}
	}

	Ok(awarded)
}

async fn qualify(
	state: &WorkerState,
	profile: &AgentProfile,
	badge: Badge,
	now: OffsetDateTime,
) -> Result<Option<Value>> {
	let metadata = match badge {
		Badge::SuperAgent => {
			let start_of_day = now.replace_time(Time::MIDNIGHT);
			let count =
				badge_store::finalized_count(&state.db, profile.tenant_id, profile.user_id, start_of_day)
					.await?;

			badges::super_agent(count)
		},
		Badge::FastResponder => {
			let rows = messages::agent_timeline(
				&state.db,
				profile.tenant_id,
				profile.user_id,
				now - TIMELINE_LOOKBACK,
			)
			.await?;
			let timeline = rows
				.iter()
				.map(|row| TimelineMessage {
					inbound: row.direction == "in",
					sent_by_agent: row.sent_by_user_id == Some(profile.user_id),
					created_at: row.created_at,
				})
				.collect::<Vec<_>>();

			badges::fast_responder(&timeline)
		},
		Badge::Favorite => {
			let ratings =
				badge_store::recent_ratings(&state.db, profile.tenant_id, profile.user_id, RECENT_RATINGS)
					.await?;

			badges::favorite(&ratings)
		},
		Badge::Consistent => {
			let days = badge_store::shift_days(
				&state.db,
				profile.tenant_id,
				profile.user_id,
				now - SHIFT_LOOKBACK,
			)
			.await?;

			badges::consistent(&days)
		},
	};

	Ok(metadata)
}

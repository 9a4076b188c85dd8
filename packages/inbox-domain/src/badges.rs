use std::collections::HashSet;

use serde_json::{Value, json};
use time::{Date, OffsetDateTime};

pub const SUPER_AGENT_MIN_CONVERSATIONS: i64 = 50;
pub const FAST_RESPONDER_MAX_AVG_SECONDS: f64 = 30.0;
pub const FAVORITE_MIN_RATINGS: usize = 10;
pub const FAVORITE_MIN_AVG_RATING: f64 = 4.5;
pub const CONSISTENT_MIN_DAYS: usize = 30;

/// Replies slower than this are not counted toward the average response time.
const MAX_COUNTED_RESPONSE_SECONDS: f64 = 3_600.0;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Badge {
	SuperAgent,
	FastResponder,
	Favorite,
	Consistent,
}
impl Badge {
	pub const ALL: [Self; 4] = [Self::SuperAgent, Self::FastResponder, Self::Favorite, Self::Consistent];

	pub fn key(self) -> &'static str {
		match self {
			Self::SuperAgent => "super_agent",
			Self::FastResponder => "fast_responder",
			Self::Favorite => "favorite",
			Self::Consistent => "consistent",
		}
	}

	pub fn display_name(self) -> &'static str {
		match self {
			Self::SuperAgent => "Super Agent",
			Self::FastResponder => "Fast Responder",
			Self::Favorite => "Favorite",
			Self::Consistent => "Consistent",
		}
	}
}

#[derive(Clone, Debug)]
pub struct TimelineMessage {
	pub inbound: bool,
	pub sent_by_agent: bool,
	pub created_at: OffsetDateTime,
}

pub fn super_agent(conversations_today: i64) -> Option<Value> {
	(conversations_today >= SUPER_AGENT_MIN_CONVERSATIONS)
		.then(|| json!({ "conversations": conversations_today }))
}

/// Average seconds between a patient message and the agent's next reply.
///
/// `timeline` must be ordered by `created_at` and already scoped to the agent's conversations.
pub fn average_response_seconds(timeline: &[TimelineMessage]) -> Option<f64> {
	let samples: Vec<f64> = timeline
		.windows(2)
		.filter(|pair| pair[0].inbound && !pair[1].inbound && pair[1].sent_by_agent)
		.map(|pair| (pair[1].created_at - pair[0].created_at).as_seconds_f64())
		.filter(|seconds| *seconds > 0.0 && *seconds < MAX_COUNTED_RESPONSE_SECONDS)
		.collect();

	if samples.is_empty() {
		return None;
	}

	Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

pub fn fast_responder(timeline: &[TimelineMessage]) -> Option<Value> {
	average_response_seconds(timeline)
		.filter(|avg| *avg < FAST_RESPONDER_MAX_AVG_SECONDS)
		.map(|avg| json!({ "avg_response_seconds": avg.round() as i64 }))
}

pub fn favorite(recent_ratings: &[i16]) -> Option<Value> {
	if recent_ratings.len() < FAVORITE_MIN_RATINGS {
		return None;
	}

	let avg = recent_ratings.iter().map(|rating| f64::from(*rating)).sum::<f64>()
		/ recent_ratings.len() as f64;

	(avg > FAVORITE_MIN_AVG_RATING)
		.then(|| json!({ "avg_rating": avg, "total_ratings": recent_ratings.len() }))
}

pub fn consistent(shift_days: &[Date]) -> Option<Value> {
	let distinct: HashSet<&Date> = shift_days.iter().collect();

	(distinct.len() >= CONSISTENT_MIN_DAYS).then(|| json!({ "days_worked": distinct.len() }))
}

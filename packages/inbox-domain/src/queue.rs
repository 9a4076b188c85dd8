//! Conversation queue state (`status_fila`).
//!
//! Every writer goes through [`QueueStatus::transition`] so that an inbound message cannot revive
//! a finalized conversation and an auto-return cannot hit a conversation nobody holds.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
	AwaitingAgent,
	InProgress,
	Finalized,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueueEvent {
	/// The patient wrote. `assigned` tells whether an agent currently holds the conversation.
	InboundMessage { assigned: bool },
	/// An outbound message reached the provider.
	OutboundSent,
	Assign,
	/// The agent stayed silent for too long and the conversation goes back to the queue.
	AutoReturn,
	Finalize,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[error("Illegal queue transition from {from:?} on {event:?}.")]
pub struct TransitionError {
	pub from: QueueStatus,
	pub event: QueueEvent,
}

impl QueueStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AwaitingAgent => "awaiting_agent",
			Self::InProgress => "in_progress",
			Self::Finalized => "finalized",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"awaiting_agent" => Some(Self::AwaitingAgent),
			"in_progress" => Some(Self::InProgress),
			"finalized" => Some(Self::Finalized),
			_ => None,
		}
	}

	pub fn is_open(self) -> bool {
		!matches!(self, Self::Finalized)
	}

	pub fn transition(self, event: QueueEvent) -> Result<Self, TransitionError> {
		let next = match (self, event) {
			(Self::Finalized, QueueEvent::OutboundSent) => Self::Finalized,
			(Self::Finalized, _) => return Err(TransitionError { from: self, event }),
			(_, QueueEvent::InboundMessage { assigned: true }) => Self::InProgress,
			(_, QueueEvent::InboundMessage { assigned: false }) => Self::AwaitingAgent,
			(status, QueueEvent::OutboundSent) => status,
			(Self::AwaitingAgent, QueueEvent::Assign) => Self::InProgress,
			(Self::InProgress, QueueEvent::AutoReturn) => Self::AwaitingAgent,
			(_, QueueEvent::Finalize) => Self::Finalized,
			(_, QueueEvent::Assign | QueueEvent::AutoReturn) =>
				return Err(TransitionError { from: self, event }),
		};

		Ok(next)
	}
}

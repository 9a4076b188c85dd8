use serde::{Deserialize, Serialize};

/// Delivery state of a message row.
///
/// The happy path is `Queued -> Sent -> Delivered -> Read`. `Failed` is terminal and can only be
/// entered before the provider confirmed delivery.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
	Queued,
	Sent,
	Delivered,
	Read,
	Failed,
}
impl MessageStatus {
	pub const ALL: [Self; 5] = [Self::Queued, Self::Sent, Self::Delivered, Self::Read, Self::Failed];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Queued => "queued",
			Self::Sent => "sent",
			Self::Delivered => "delivered",
			Self::Read => "read",
			Self::Failed => "failed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"queued" | "pending" => Some(Self::Queued),
			"sent" => Some(Self::Sent),
			"delivered" => Some(Self::Delivered),
			"read" => Some(Self::Read),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	fn rank(self) -> Option<u8> {
		match self {
			Self::Queued => Some(0),
			Self::Sent => Some(1),
			Self::Delivered => Some(2),
			Self::Read => Some(3),
			Self::Failed => None,
		}
	}

	/// Whether moving from `self` to `next` is forward progress.
	pub fn advances_to(self, next: Self) -> bool {
		match (self.rank(), next.rank()) {
			(Some(current), Some(next)) => next > current,
			(Some(current), None) => current <= 1,
			(None, _) => false,
		}
	}

	/// Every status from which `self` is reachable in one forward step.
	///
	/// The store uses this list as a guard so concurrent updates cannot regress a row.
	pub fn predecessors(self) -> Vec<&'static str> {
		Self::ALL
			.into_iter()
			.filter(|status| status.advances_to(self))
			.map(Self::as_str)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_accepts_every_earlier_state() {
		assert_eq!(MessageStatus::Read.predecessors(), vec!["queued", "sent", "delivered"]);
	}

	#[test]
	fn nothing_precedes_queued() {
		assert!(MessageStatus::Queued.predecessors().is_empty());
	}
}

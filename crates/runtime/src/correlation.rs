//! Correlation id allocation.

use blpapi_protocol::CorrelationId;

/// Hands out correlation ids for one session.
///
/// Ids start at zero, increase by one per allocation and are never reused.
#[derive(Debug, Default)]
pub struct Correlator {
	next: CorrelationId,
}

impl Correlator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the current counter value and advances it.
	pub fn next(&mut self) -> CorrelationId {
		let id = self.next;
		self.next += 1;
		id
	}

	/// Number of ids handed out so far.
	pub fn allocated(&self) -> u64 {
		self.next
	}
}

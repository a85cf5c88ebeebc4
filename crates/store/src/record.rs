use bytes::Bytes;
use uuid::Uuid;

use crate::flags::PolicyAttributes;

/// Maximum size of a policy payload in bytes.
pub const POLICY_MAX_SIZE: usize = u16::MAX as usize;

/// Payload storage for one policy record.
///
/// The two arms make buffer ownership explicit: the store frees and reuses
/// heap buffers, while boot payloads are views into memory it does not own.
pub(crate) enum PolicyPayload {
	/// Owned buffer. Spare `Vec` capacity is reused by same-or-smaller
	/// updates instead of reallocating.
	Heap(Vec<u8>),
	/// On loan from the boot image: never freed or written by the store.
	/// Any update reallocates onto the heap.
	Boot(Bytes),
}

impl PolicyPayload {
	pub(crate) fn as_slice(&self) -> &[u8] {
		match self {
			PolicyPayload::Heap(buf) => buf,
			PolicyPayload::Boot(bytes) => bytes,
		}
	}
}

pub(crate) struct PolicyRecord {
	pub(crate) id: Uuid,
	pub(crate) attributes: PolicyAttributes,
	pub(crate) payload: PolicyPayload,
	/// Nested notification dispatches currently in progress for this
	/// record; zero when idle.
	pub(crate) notify_depth: u32,
	/// The record was removed while notifications were possibly in flight;
	/// its slot is released when dispatch unwinds to depth zero.
	pub(crate) pending_free: bool,
}

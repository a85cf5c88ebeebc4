use bitflags::bitflags;

bitflags! {
	/// Attribute flags stored alongside a policy.
	#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct PolicyAttributes: u64 {
		/// The policy is immutable for the rest of the process lifetime.
		/// Further sets are rejected; removal is still permitted.
		const FINALIZED = 1 << 0;
		/// The policy is restricted to the environment that produced it and
		/// is skipped by cross-environment bootstrap ingestion.
		const ENVIRONMENT_ONLY = 1 << 1;
	}
}

bitflags! {
	/// Event flags delivered to notification subscribers.
	///
	/// A single dispatch can carry several events at once: setting a policy
	/// with [`PolicyAttributes::FINALIZED`] delivers `SET | FINALIZED`.
	#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct PolicyEvents: u32 {
		/// The policy content and/or attributes were set.
		const SET = 1 << 0;
		/// The policy transitioned to finalized.
		const FINALIZED = 1 << 1;
		/// The policy was removed. Always the last event for a record.
		const REMOVED = 1 << 2;
	}
}

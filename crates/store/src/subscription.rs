use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::flags::PolicyEvents;
use crate::store::PolicyStore;

/// Priority for subscribers with no ordering requirement of their own.
pub const DEFAULT_NOTIFY_PRIORITY: u32 = 512;

/// Callback invoked when a watched policy changes.
///
/// Receives the store itself and may re-enter any operation, including
/// removing the policy that triggered it or unregistering the very
/// subscription being notified. The handle argument is the subscription's
/// own, suitable for self-unregistration.
pub type NotifyCallback =
	Arc<dyn Fn(&mut PolicyStore, Uuid, PolicyEvents, SubscriptionHandle) + Send + Sync>;

/// Opaque handle to a registered subscription.
///
/// Carries the node's slot and its registration token; the token rejects
/// foreign handles and handles whose slot has since been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
	pub(crate) slot: usize,
	pub(crate) token: u64,
}

pub(crate) struct Subscription {
	pub(crate) id: Uuid,
	pub(crate) events: PolicyEvents,
	pub(crate) priority: u32,
	pub(crate) token: u64,
	pub(crate) callback: NotifyCallback,
	/// Logically unregistered but still linked while a dispatch may hold a
	/// cursor into the registry.
	pub(crate) tombstoned: bool,
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("events", &self.events)
			.field("priority", &self.priority)
			.field("token", &self.token)
			.field("tombstoned", &self.tombstoned)
			.finish_non_exhaustive()
	}
}

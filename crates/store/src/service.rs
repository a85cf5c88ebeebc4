use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::PolicyError;
use crate::flags::{PolicyAttributes, PolicyEvents};
use crate::store::{PolicyInfo, PolicyStore};
use crate::subscription::{NotifyCallback, SubscriptionHandle};

/// Cloneable handle serializing distinct callers into one [`PolicyStore`].
///
/// The lock is held for the full duration of each operation, including any
/// notification callbacks the operation triggers. Callbacks therefore run
/// with the guard already held by their own call chain and must re-enter
/// the store through the `&mut PolicyStore` they receive, never through
/// this handle.
#[derive(Clone)]
pub struct SharedPolicyStore {
	inner: Arc<Mutex<PolicyStore>>,
}

impl SharedPolicyStore {
	pub fn new(store: PolicyStore) -> Self {
		Self {
			inner: Arc::new(Mutex::new(store)),
		}
	}

	pub fn set(
		&self,
		id: Uuid,
		attributes: PolicyAttributes,
		payload: &[u8],
	) -> Result<(), PolicyError> {
		self.inner.lock().set(id, attributes, payload)
	}

	pub fn get(&self, id: &Uuid, out: &mut [u8]) -> Result<PolicyInfo, PolicyError> {
		self.inner.lock().get(id, out)
	}

	pub fn get_attributes(&self, id: &Uuid) -> Result<PolicyAttributes, PolicyError> {
		self.inner.lock().get_attributes(id)
	}

	pub fn remove(&self, id: &Uuid) -> Result<(), PolicyError> {
		self.inner.lock().remove(id)
	}

	pub fn register_notify(
		&self,
		id: Uuid,
		events: PolicyEvents,
		priority: u32,
		callback: NotifyCallback,
	) -> Result<SubscriptionHandle, PolicyError> {
		self.inner
			.lock()
			.register_notify(id, events, priority, callback)
	}

	pub fn unregister_notify(&self, handle: SubscriptionHandle) -> Result<(), PolicyError> {
		self.inner.lock().unregister_notify(handle)
	}

	/// Runs `f` under the store lock, for work outside the service surface
	/// (bootstrap ingestion, typed accessors).
	pub fn with<R>(&self, f: impl FnOnce(&mut PolicyStore) -> R) -> R {
		f(&mut self.inner.lock())
	}
}

impl Default for SharedPolicyStore {
	fn default() -> Self {
		Self::new(PolicyStore::new())
	}
}

//! The policy store: entry table, subscriber registry, and the
//! recursion-safe notification dispatcher.
//!
//! # Reentrancy model
//!
//! Notification callbacks receive `&mut PolicyStore` and may re-enter any
//! operation mid-dispatch. Two mechanisms keep the walk over the subscriber
//! registry safe without locking out those reentrant calls:
//!
//! - Unregistering while any dispatch is in progress only tombstones the
//!   node; it stays linked until the outermost dispatch sweeps it, so a
//!   walk's cursor position always survives the callback it just invoked.
//! - Each record carries a dispatch depth counter. A nested dispatch for
//!   the same record leaves the counter raised, and only the depth-one
//!   frame resets it; an interrupted outer walk re-reads the counter after
//!   every callback and stops on mismatch, because the nested dispatch
//!   already serviced the remaining subscribers with newer state.
//!
//! Record slots are released in exactly one place, the depth-one frame's
//! unwind, which covers removal both mid-dispatch and from idle.

use bytes::Bytes;
use slab::Slab;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::PolicyError;
use crate::flags::{PolicyAttributes, PolicyEvents};
use crate::record::{POLICY_MAX_SIZE, PolicyPayload, PolicyRecord};
use crate::sink::ExistenceSink;
use crate::subscription::{NotifyCallback, Subscription, SubscriptionHandle};

/// Size and attributes of a stored policy, returned by [`PolicyStore::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyInfo {
	/// Exact size of the stored payload.
	pub size: u16,
	pub attributes: PolicyAttributes,
}

/// In-memory policy store with change notification.
///
/// Single-threaded; all dispatch bookkeeping lives in the instance so
/// independent stores never interfere. See the module docs for the
/// reentrancy protocol.
pub struct PolicyStore {
	policies: Slab<PolicyRecord>,
	/// Entry table order. Tail insertion; a record is reachable from
	/// lookups only while its slot is linked here.
	policy_order: Vec<usize>,
	subscriptions: Slab<Subscription>,
	/// Registry order: ascending priority, registration order among
	/// equals.
	subscription_order: Vec<usize>,
	/// Registration stamp source for subscription handles.
	next_token: u64,
	/// True while any notification call chain is executing, including
	/// reentrant ones.
	notifying: bool,
	/// An unregister deferred a delete by tombstoning during dispatch.
	tombstones_pending: bool,
	existence_sink: Option<Box<dyn ExistenceSink + Send>>,
}

impl PolicyStore {
	pub fn new() -> Self {
		Self {
			policies: Slab::new(),
			policy_order: Vec::new(),
			subscriptions: Slab::new(),
			subscription_order: Vec::new(),
			next_token: 0,
			notifying: false,
			tombstones_pending: false,
			existence_sink: None,
		}
	}

	/// A store that announces every identifier it comes to hold on `sink`.
	pub fn with_existence_sink(sink: Box<dyn ExistenceSink + Send>) -> Self {
		Self {
			existence_sink: Some(sink),
			..Self::new()
		}
	}

	/// Number of policies currently reachable.
	pub fn len(&self) -> usize {
		self.policy_order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.policy_order.is_empty()
	}

	pub fn exists(&self, id: &Uuid) -> bool {
		self.lookup(id).is_some()
	}

	/// Slot of the record for `id`, if reachable.
	///
	/// Linear scan; the expected population is tens of policies.
	fn lookup(&self, id: &Uuid) -> Option<usize> {
		self.policy_order
			.iter()
			.copied()
			.find(|&slot| self.policies[slot].id == *id)
	}

	/// Creates or updates the policy for `id` and notifies subscribers.
	///
	/// An existing heap buffer is reused when the new payload fits its
	/// capacity; otherwise a buffer of exactly `payload.len()` is
	/// allocated before any record state changes, so a failed set is
	/// invisible. Raises [`PolicyEvents::SET`], plus
	/// [`PolicyEvents::FINALIZED`] when `attributes` carries the
	/// finalized bit.
	pub fn set(
		&mut self,
		id: Uuid,
		attributes: PolicyAttributes,
		payload: &[u8],
	) -> Result<(), PolicyError> {
		if payload.len() > POLICY_MAX_SIZE {
			return Err(PolicyError::InvalidParameter);
		}

		let slot = match self.lookup(&id) {
			Some(slot) => {
				let record = &mut self.policies[slot];
				if record.attributes.contains(PolicyAttributes::FINALIZED) {
					return Err(PolicyError::AccessDenied);
				}

				match &mut record.payload {
					PolicyPayload::Heap(buf) if payload.len() <= buf.capacity() => {
						buf.clear();
						buf.extend_from_slice(payload);
					}
					_ => {
						// Covers growth and the boot-loan case alike: the
						// prior buffer is dropped only if it was owned.
						record.payload = PolicyPayload::Heap(copy_payload(payload)?);
					}
				}
				record.attributes = attributes;
				slot
			}
			None => {
				let buf = copy_payload(payload)?;
				let slot = self.policies.insert(PolicyRecord {
					id,
					attributes,
					payload: PolicyPayload::Heap(buf),
					notify_depth: 0,
					pending_free: false,
				});
				self.policy_order.push(slot);
				slot
			}
		};

		let mut events = PolicyEvents::SET;
		if self.policies[slot]
			.attributes
			.contains(PolicyAttributes::FINALIZED)
		{
			events |= PolicyEvents::FINALIZED;
		}
		self.notify(events, slot);
		self.announce(id);
		Ok(())
	}

	/// Seeds a policy whose payload is on loan from the boot image.
	///
	/// Raises no events (bootstrap predates all subscribers) but still
	/// announces the identifier on the existence side channel. The
	/// identifier must not already be present.
	pub fn insert_bootstrapped(
		&mut self,
		id: Uuid,
		attributes: PolicyAttributes,
		payload: Bytes,
	) -> Result<(), PolicyError> {
		if payload.len() > POLICY_MAX_SIZE || self.exists(&id) {
			return Err(PolicyError::InvalidParameter);
		}

		let slot = self.policies.insert(PolicyRecord {
			id,
			attributes,
			payload: PolicyPayload::Boot(payload),
			notify_depth: 0,
			pending_free: false,
		});
		self.policy_order.push(slot);
		self.announce(id);
		Ok(())
	}

	/// Copies the payload for `id` into `out`.
	///
	/// When `out` cannot hold the stored payload, fails with
	/// [`PolicyError::BufferTooSmall`] carrying the required size and
	/// leaves `out` untouched.
	pub fn get(&self, id: &Uuid, out: &mut [u8]) -> Result<PolicyInfo, PolicyError> {
		let slot = self.lookup(id).ok_or(PolicyError::NotFound)?;
		let record = &self.policies[slot];
		let data = record.payload.as_slice();
		let size = data.len() as u16;
		if out.len() < data.len() {
			return Err(PolicyError::BufferTooSmall { required: size });
		}

		out[..data.len()].copy_from_slice(data);
		Ok(PolicyInfo {
			size,
			attributes: record.attributes,
		})
	}

	/// Copies the payload for `id` into a fresh buffer sized to fit.
	pub fn get_to_vec(&self, id: &Uuid) -> Result<(Vec<u8>, PolicyAttributes), PolicyError> {
		let slot = self.lookup(id).ok_or(PolicyError::NotFound)?;
		let record = &self.policies[slot];
		let buf = copy_payload(record.payload.as_slice())?;
		Ok((buf, record.attributes))
	}

	pub fn get_attributes(&self, id: &Uuid) -> Result<PolicyAttributes, PolicyError> {
		let slot = self.lookup(id).ok_or(PolicyError::NotFound)?;
		Ok(self.policies[slot].attributes)
	}

	/// Removes the policy for `id` and notifies subscribers.
	///
	/// The record is unlinked before the [`PolicyEvents::REMOVED`]
	/// dispatch, so callbacks already observe it as gone; its slot is
	/// released once the dispatch unwinds.
	pub fn remove(&mut self, id: &Uuid) -> Result<(), PolicyError> {
		let slot = self.lookup(id).ok_or(PolicyError::NotFound)?;
		self.policy_order.retain(|&s| s != slot);

		let record = &mut self.policies[slot];
		// Drop an owned buffer now; a boot loan is merely released back to
		// the image.
		record.payload = PolicyPayload::Heap(Vec::new());
		record.pending_free = true;
		self.notify(PolicyEvents::REMOVED, slot);
		Ok(())
	}

	/// Subscribes `callback` to `events` for the policy `id`.
	///
	/// Lower priorities run earlier; equal priorities run in registration
	/// order. Registering is legal from inside a callback: a node inserted
	/// behind the in-flight cursor is picked up by the same walk.
	pub fn register_notify(
		&mut self,
		id: Uuid,
		events: PolicyEvents,
		priority: u32,
		callback: NotifyCallback,
	) -> Result<SubscriptionHandle, PolicyError> {
		// An empty mask can never fire; unknown bits are a caller bug.
		if events.is_empty() || PolicyEvents::from_bits(events.bits()).is_none() {
			return Err(PolicyError::InvalidParameter);
		}

		self.next_token += 1;
		let token = self.next_token;
		let slot = self.subscriptions.insert(Subscription {
			id,
			events,
			priority,
			token,
			callback,
			tombstoned: false,
		});

		// Before the first node with a strictly greater priority, after
		// all equal-or-lower ones.
		let position = self
			.subscription_order
			.iter()
			.position(|&s| self.subscriptions[s].priority > priority)
			.unwrap_or(self.subscription_order.len());
		self.subscription_order.insert(position, slot);

		Ok(SubscriptionHandle { slot, token })
	}

	/// Unregisters the subscription behind `handle`.
	///
	/// Immediate while no dispatch is in progress anywhere; during a
	/// dispatch the node is only tombstoned and swept when the outermost
	/// dispatch completes. The handle stays valid to pass here until the
	/// node is physically gone.
	pub fn unregister_notify(&mut self, handle: SubscriptionHandle) -> Result<(), PolicyError> {
		let node = self
			.subscriptions
			.get(handle.slot)
			.ok_or(PolicyError::NotFound)?;
		if node.token != handle.token {
			return Err(PolicyError::InvalidParameter);
		}

		if self.notifying {
			self.subscriptions[handle.slot].tombstoned = true;
			self.tombstones_pending = true;
		} else {
			self.subscription_order.retain(|&s| s != handle.slot);
			self.subscriptions.remove(handle.slot);
		}
		Ok(())
	}

	/// Dispatches `events` for the record in `slot` to every matching
	/// subscriber, in registry order.
	fn notify(&mut self, events: PolicyEvents, slot: usize) {
		let outermost = !self.notifying;
		self.notifying = true;

		let record = &mut self.policies[slot];
		record.notify_depth = record
			.notify_depth
			.checked_add(1)
			.expect("notification depth overflow");
		let depth = record.notify_depth;
		let id = record.id;
		trace!(policy = %id, ?events, depth, "notify");

		let mut cursor = self.subscription_order.first().copied();
		while let Some(key) = cursor {
			let node = &self.subscriptions[key];
			if node.id == id && node.events.intersects(events) && !node.tombstoned {
				let callback = node.callback.clone();
				let handle = SubscriptionHandle {
					slot: key,
					token: node.token,
				};
				callback(self, id, events, handle);

				// A nested dispatch for this record left the counter
				// raised; it already serviced the remaining subscribers
				// with newer state, so this walk is moot.
				if self.policies[slot].notify_depth != depth {
					break;
				}
			}
			cursor = self.successor(key);
		}

		if depth == 1 {
			let record = &mut self.policies[slot];
			record.notify_depth = 0;
			if record.pending_free {
				self.policies.remove(slot);
			}
		}

		if outermost {
			if self.tombstones_pending {
				self.sweep_tombstones();
			}
			self.notifying = false;
		}
	}

	/// Key of the node after `key` in the current registry order.
	///
	/// Re-locating by key after every callback makes nested register and
	/// unregister calls harmless to the walk. The current node is always
	/// still linked mid-dispatch (unregistration only tombstones while
	/// `notifying` is set), so a missing key is a broken invariant, not a
	/// caller error.
	fn successor(&self, key: usize) -> Option<usize> {
		let position = self
			.subscription_order
			.iter()
			.position(|&s| s == key)
			.expect("dispatch cursor unlinked mid-walk");
		self.subscription_order.get(position + 1).copied()
	}

	/// Physically unlinks every tombstoned node. Runs once, at the end of
	/// the outermost dispatch.
	fn sweep_tombstones(&mut self) {
		let subscriptions = &mut self.subscriptions;
		let before = self.subscription_order.len();
		self.subscription_order.retain(|&slot| {
			if subscriptions[slot].tombstoned {
				subscriptions.remove(slot);
				false
			} else {
				true
			}
		});
		debug!(
			swept = before - self.subscription_order.len(),
			"swept tombstoned subscriptions"
		);
		self.tombstones_pending = false;
	}

	fn announce(&mut self, id: Uuid) {
		if let Some(sink) = self.existence_sink.as_mut() {
			sink.announce(id);
		}
	}
}

impl Default for PolicyStore {
	fn default() -> Self {
		Self::new()
	}
}

/// Allocates an owned buffer of exactly the payload's size.
///
/// Fallible so a set observed to fail with
/// [`PolicyError::OutOfResources`] has touched nothing yet.
fn copy_payload(payload: &[u8]) -> Result<Vec<u8>, PolicyError> {
	let mut buf = Vec::new();
	buf.try_reserve_exact(payload.len())
		.map_err(|_| PolicyError::OutOfResources)?;
	buf.extend_from_slice(payload);
	Ok(buf)
}

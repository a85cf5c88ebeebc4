//! In-memory policy store with change notification.
//!
//! Firmware-level components publish small opaque configuration blobs
//! ("policies") keyed by a 128-bit identifier, retrieve them, mark them
//! immutable, and subscribe to set/finalize/remove events. Policies seeded
//! from the pre-boot environment keep their payloads on loan from the boot
//! image and are never freed by the store.
//!
//! The engine is single-threaded and reentrant: notification callbacks
//! receive the store itself and may set, remove, register, or unregister
//! mid-dispatch, including against the very policy or subscription being
//! processed. [`SharedPolicyStore`] layers the mutual exclusion that
//! serializes distinct callers on top.

mod error;
mod flags;
mod record;
mod service;
mod sink;
mod store;
mod subscription;
pub mod typed;

pub use error::PolicyError;
pub use flags::{PolicyAttributes, PolicyEvents};
pub use record::POLICY_MAX_SIZE;
pub use service::SharedPolicyStore;
pub use sink::ExistenceSink;
pub use store::{PolicyInfo, PolicyStore};
pub use subscription::{DEFAULT_NOTIFY_PRIORITY, NotifyCallback, SubscriptionHandle};

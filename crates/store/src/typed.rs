//! Versioned, signature-checked policies layered over the raw byte store.
//!
//! A typed policy is an ordinary policy whose payload starts with a
//! 16-byte little-endian header:
//!
//! ```text
//! signature      8 bytes   caller-chosen structure discriminator
//! major version  2 bytes   must match exactly on read
//! minor version  2 bytes   informational
//! body size      4 bytes   exact length of the body that follows
//! ```
//!
//! Readers declare the shape they expect via [`TypedPolicyDescriptor`] and
//! get back an owned [`TypedPolicy`] only when the stored header agrees,
//! so a structure revision can never be misread as an older layout.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::error::PolicyError;
use crate::flags::PolicyAttributes;
use crate::record::POLICY_MAX_SIZE;
use crate::store::PolicyStore;

/// Byte length of the typed policy header prefix.
pub const TYPED_HEADER_LEN: usize = 16;

/// Caller-declared shape of a typed policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedPolicyDescriptor {
	/// Discriminator identifying the policy structure.
	pub signature: u64,
	/// Checked exactly against the stored header on read.
	pub major_version: u16,
	/// Informational; not checked.
	pub minor_version: u16,
	/// Exact length of the policy body in bytes.
	pub body_len: u32,
}

/// An owned typed policy buffer: header followed by the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedPolicy {
	buf: Vec<u8>,
}

impl TypedPolicy {
	/// A zero-filled body under the descriptor's header.
	pub fn new(descriptor: &TypedPolicyDescriptor) -> Self {
		let total = TYPED_HEADER_LEN + descriptor.body_len as usize;
		let mut buf = Vec::with_capacity(total);
		buf.put_u64_le(descriptor.signature);
		buf.put_u16_le(descriptor.major_version);
		buf.put_u16_le(descriptor.minor_version);
		buf.put_u32_le(descriptor.body_len);
		buf.resize(total, 0);
		Self { buf }
	}

	pub fn body(&self) -> &[u8] {
		&self.buf[TYPED_HEADER_LEN..]
	}

	pub fn body_mut(&mut self) -> &mut [u8] {
		&mut self.buf[TYPED_HEADER_LEN..]
	}

	/// The full header-prefixed payload as it is stored.
	pub fn as_bytes(&self) -> &[u8] {
		&self.buf
	}
}

/// Retrieves the policy for `id` and verifies it against `descriptor`.
pub fn get_typed(
	store: &PolicyStore,
	id: &Uuid,
	descriptor: &TypedPolicyDescriptor,
) -> Result<(TypedPolicy, PolicyAttributes), PolicyError> {
	let (buf, attributes) = store.get_to_vec(id)?;
	if buf.len() < TYPED_HEADER_LEN {
		return Err(PolicyError::BadBufferSize);
	}

	let header = decode_header(&buf);
	if header.signature != descriptor.signature
		|| header.major_version != descriptor.major_version
	{
		return Err(PolicyError::IncompatibleVersion);
	}
	if header.body_len != descriptor.body_len
		|| buf.len() != TYPED_HEADER_LEN + header.body_len as usize
	{
		return Err(PolicyError::BadBufferSize);
	}

	Ok((TypedPolicy { buf }, attributes))
}

/// Stores a typed policy through the normal set path, raising the usual
/// events.
pub fn set_typed(
	store: &mut PolicyStore,
	id: Uuid,
	attributes: PolicyAttributes,
	policy: &TypedPolicy,
) -> Result<(), PolicyError> {
	if policy.buf.len() > POLICY_MAX_SIZE {
		return Err(PolicyError::BadBufferSize);
	}
	store.set(id, attributes, &policy.buf)
}

fn decode_header(mut buf: &[u8]) -> TypedPolicyDescriptor {
	TypedPolicyDescriptor {
		signature: buf.get_u64_le(),
		major_version: buf.get_u16_le(),
		minor_version: buf.get_u16_le(),
		body_len: buf.get_u32_le(),
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::{TYPED_HEADER_LEN, TypedPolicy, TypedPolicyDescriptor, get_typed, set_typed};
	use crate::error::PolicyError;
	use crate::flags::PolicyAttributes;
	use crate::store::PolicyStore;

	const DESCRIPTOR: TypedPolicyDescriptor = TypedPolicyDescriptor {
		signature: 0x544f_4f42_4c4f_5024,
		major_version: 2,
		minor_version: 1,
		body_len: 8,
	};

	#[test]
	fn typed_set_then_get_roundtrips_body() {
		let mut store = PolicyStore::new();
		let id = Uuid::new_v4();

		let mut policy = TypedPolicy::new(&DESCRIPTOR);
		policy.body_mut().copy_from_slice(&[7u8; 8]);
		set_typed(&mut store, id, PolicyAttributes::empty(), &policy).unwrap();

		let (read, attributes) = get_typed(&store, &id, &DESCRIPTOR).unwrap();
		assert_eq!(read.body(), &[7u8; 8]);
		assert_eq!(attributes, PolicyAttributes::empty());
		assert_eq!(read.as_bytes().len(), TYPED_HEADER_LEN + 8);
	}

	#[test]
	fn major_version_bump_is_incompatible() {
		let mut store = PolicyStore::new();
		let id = Uuid::new_v4();
		let policy = TypedPolicy::new(&DESCRIPTOR);
		set_typed(&mut store, id, PolicyAttributes::empty(), &policy).unwrap();

		let newer = TypedPolicyDescriptor {
			major_version: 3,
			..DESCRIPTOR
		};
		assert_eq!(
			get_typed(&store, &id, &newer),
			Err(PolicyError::IncompatibleVersion)
		);

		let foreign = TypedPolicyDescriptor {
			signature: 1,
			..DESCRIPTOR
		};
		assert_eq!(
			get_typed(&store, &id, &foreign),
			Err(PolicyError::IncompatibleVersion)
		);
	}

	#[test]
	fn body_length_mismatch_is_a_size_error() {
		let mut store = PolicyStore::new();
		let id = Uuid::new_v4();
		let policy = TypedPolicy::new(&DESCRIPTOR);
		set_typed(&mut store, id, PolicyAttributes::empty(), &policy).unwrap();

		let wider = TypedPolicyDescriptor {
			body_len: 16,
			..DESCRIPTOR
		};
		assert_eq!(
			get_typed(&store, &id, &wider),
			Err(PolicyError::BadBufferSize)
		);
	}

	#[test]
	fn raw_policy_shorter_than_the_header_is_rejected() {
		let mut store = PolicyStore::new();
		let id = Uuid::new_v4();
		store.set(id, PolicyAttributes::empty(), b"shrt").unwrap();

		assert_eq!(
			get_typed(&store, &id, &DESCRIPTOR),
			Err(PolicyError::BadBufferSize)
		);
	}
}

//! Wire format of the pre-boot policy image.
//!
//! The image is a packed sequence of little-endian records, each a fixed
//! header followed by the payload bytes:
//!
//! ```text
//! identifier     16 bytes   raw 128-bit policy identifier
//! attributes      8 bytes   attribute flag bits
//! payload size    2 bytes
//! removed         1 byte    nonzero: superseded before handoff
//! payload         payload-size bytes
//! ```

use bytes::{Buf, BufMut, Bytes};
use slate_store::PolicyAttributes;
use thiserror::Error;
use uuid::Uuid;

/// Byte length of the fixed record header.
pub const BOOT_RECORD_HEADER_LEN: usize = 27;

/// Errors raised while parsing a boot image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootImageError {
	/// A record header claims more payload than the image holds.
	#[error("record at offset {offset} extends past the image end")]
	Truncated {
		/// Image offset of the offending record header.
		offset: usize,
	},
	/// Bytes remain at the image end but are too short for a header.
	#[error("{remaining} trailing bytes are too short for a record header")]
	TrailingBytes { remaining: usize },
}

/// One parsed pre-boot policy record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRecord {
	pub id: Uuid,
	pub attributes: PolicyAttributes,
	/// The record was superseded before handoff and must not be ingested.
	pub removed: bool,
	/// Zero-copy view into the boot image.
	pub payload: Bytes,
}

/// Iterator over the records of a boot image.
///
/// Yields records until the image is exhausted; a malformed record yields
/// one error and ends the iteration.
pub struct BootRecords {
	image: Bytes,
	offset: usize,
}

impl BootRecords {
	pub fn new(image: Bytes) -> Self {
		Self { image, offset: 0 }
	}
}

impl Iterator for BootRecords {
	type Item = Result<BootRecord, BootImageError>;

	fn next(&mut self) -> Option<Self::Item> {
		let remaining = self.image.len() - self.offset;
		if remaining == 0 {
			return None;
		}
		if remaining < BOOT_RECORD_HEADER_LEN {
			self.offset = self.image.len();
			return Some(Err(BootImageError::TrailingBytes { remaining }));
		}

		let mut header = &self.image[self.offset..self.offset + BOOT_RECORD_HEADER_LEN];
		let mut id = [0u8; 16];
		header.copy_to_slice(&mut id);
		let attributes = PolicyAttributes::from_bits_retain(header.get_u64_le());
		let payload_len = usize::from(header.get_u16_le());
		let removed = header.get_u8() != 0;

		let payload_start = self.offset + BOOT_RECORD_HEADER_LEN;
		let payload_end = payload_start + payload_len;
		if payload_end > self.image.len() {
			let offset = self.offset;
			self.offset = self.image.len();
			return Some(Err(BootImageError::Truncated { offset }));
		}

		self.offset = payload_end;
		Some(Ok(BootRecord {
			id: Uuid::from_bytes(id),
			attributes,
			removed,
			payload: self.image.slice(payload_start..payload_end),
		}))
	}
}

/// Lays out a boot image byte-for-byte as the pre-boot environment does.
#[derive(Debug, Default)]
pub struct BootImageBuilder {
	buf: Vec<u8>,
}

impl BootImageBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(
		mut self,
		id: Uuid,
		attributes: PolicyAttributes,
		removed: bool,
		payload: &[u8],
	) -> Self {
		debug_assert!(payload.len() <= usize::from(u16::MAX));
		self.buf.put_slice(id.as_bytes());
		self.buf.put_u64_le(attributes.bits());
		self.buf.put_u16_le(payload.len() as u16);
		self.buf.put_u8(removed.into());
		self.buf.put_slice(payload);
		self
	}

	pub fn finish(self) -> Bytes {
		self.buf.into()
	}
}

use thiserror::Error;

/// Errors returned by policy store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
	/// A caller-supplied argument was malformed: an oversized payload, an
	/// empty event mask, or a foreign subscription handle. Never retried;
	/// the caller must fix its input.
	#[error("invalid parameter")]
	InvalidParameter,
	/// The policy or subscription does not exist.
	#[error("not found")]
	NotFound,
	/// The policy is finalized and rejects further updates.
	#[error("policy is finalized")]
	AccessDenied,
	/// The caller's buffer cannot hold the stored payload. Recoverable:
	/// resize to `required` and retry.
	#[error("buffer too small, {required} bytes required")]
	BufferTooSmall {
		/// Exact size of the stored payload.
		required: u16,
	},
	/// Payload allocation failed. State is unchanged; no partial insert is
	/// visible.
	#[error("out of resources")]
	OutOfResources,
	/// A typed policy's signature or major version did not match the
	/// caller's descriptor.
	#[error("typed policy signature or major version mismatch")]
	IncompatibleVersion,
	/// A typed policy's stored shape did not match the caller's descriptor.
	#[error("typed policy size mismatch")]
	BadBufferSize,
}

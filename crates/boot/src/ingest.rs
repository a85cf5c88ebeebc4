//! Startup ingestion of pre-boot policies into a store.

use bytes::Bytes;
use slate_store::{PolicyAttributes, PolicyError, PolicyStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::image::{BootImageError, BootRecords};

/// Errors raised by [`ingest`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
	#[error("malformed boot image: {0}")]
	Image(#[from] BootImageError),
	#[error(transparent)]
	Store(#[from] PolicyError),
}

/// Seeds `store` from a read-only boot image.
///
/// Records marked removed, and records restricted to the environment that
/// produced them, are skipped. A duplicate identifier is logged and skipped
/// without aborting the rest of the image. Ingested payloads are zero-copy
/// views into `image`. Returns the number of policies ingested.
///
/// No events are raised; bootstrap runs before any subscriber can exist.
/// Each ingested identifier is still announced on the store's existence
/// side channel.
pub fn ingest(store: &mut PolicyStore, image: Bytes) -> Result<usize, IngestError> {
	let mut ingested = 0usize;
	for record in BootRecords::new(image) {
		let record = record?;
		if record.removed {
			continue;
		}
		if record
			.attributes
			.contains(PolicyAttributes::ENVIRONMENT_ONLY)
		{
			continue;
		}
		if store.exists(&record.id) {
			warn!(policy = %record.id, "duplicate boot record skipped");
			continue;
		}

		store.insert_bootstrapped(record.id, record.attributes, record.payload)?;
		ingested += 1;
	}

	info!(policies = ingested, "ingested boot policies");
	Ok(ingested)
}

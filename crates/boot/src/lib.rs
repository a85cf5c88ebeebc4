//! Bootstrap boundary for the policy store.
//!
//! The pre-boot environment hands later stages a read-only image holding
//! the policies it accumulated. This crate owns the wire format of that
//! image ([`BootRecords`], [`BootImageBuilder`]) and the startup loop that
//! seeds a [`slate_store::PolicyStore`] from it ([`ingest`]). Ingested
//! payloads stay on loan from the image; the store never copies or frees
//! them.

mod image;
mod ingest;

pub use image::{BOOT_RECORD_HEADER_LEN, BootImageBuilder, BootImageError, BootRecord, BootRecords};
pub use ingest::{IngestError, ingest};

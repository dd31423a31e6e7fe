//! Credential archive storage
//!
//! The uploader zips a session's credential directory; a [`BlobStore`]
//! decides where the archive ends up.

pub mod archive;
pub mod blob;
pub mod supabase;

pub use archive::{ARCHIVE_CONTENT_TYPE, ArchiveUploader, archive_key, build_archive};
pub use blob::{BlobStore, DisabledBlobStore, LocalBlobStore, MemoryBlobStore, StoredBlob};
pub use supabase::{SupabaseConfig, SupabaseStorage};

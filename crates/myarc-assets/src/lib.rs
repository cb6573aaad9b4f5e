//! Object-storage asset management for entry images.
//!
//! Assets have no first-class database identity: an image exists only as a
//! storage object whose URL is embedded in entry rich text. The scanner here
//! reconstructs the referenced-key set from content, and the store moves the
//! bytes. Upload gating constants live here too so every caller enforces the
//! same limits.

mod asset_store;
mod key_scan;

pub use asset_store::{
    new_asset_key, AssetError, AssetStore, DisabledAssetStore, S3AssetStore, ALLOWED_IMAGE_TYPES,
    ASSET_KEY_PREFIX, MAX_UPLOAD_BYTES,
};
pub use key_scan::AssetUrlScanner;

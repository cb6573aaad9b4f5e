//! Entry lifecycle orchestration.
//!
//! Coordinates the encryption codec, text normalizer, asset manager,
//! pending-upload tracker, and embedding adapter across create, update,
//! delete, and read, enforcing the consistency rules between the entry
//! document, its encrypted content, and the storage objects that content
//! references. Only primary-store failures are fatal; every auxiliary step
//! is best-effort and log-only.

mod lifecycle;
mod momentum;
#[cfg(test)]
mod tests;

pub use lifecycle::{
    EntryDraft, EntryError, EntryLifecycle, EntryView, SaveOutcome, SavedEntry, UploadedAsset,
    STALE_UPLOAD_THRESHOLD_MS,
};
pub use momentum::{
    run_momentum_nudges, LogNotifier, Notifier, NotifyError, NudgeReport, NudgeStatus,
    INACTIVITY_THRESHOLD_MS,
};

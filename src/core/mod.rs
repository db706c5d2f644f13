// ─── DTO Updater Core ───
// Self-update engine for the add-in, run when the host shuts down.
//
// Architecture:
//   core/
//     release/    Registry client + release/asset model
//     downloader/ Sequential streaming asset downloads
//     archive/    Zip extraction + flattening
//     reconcile/  Copy into the live install, helper process, post-install hook
//     state/      appSettings store (version marker) + run configuration
//     update/     Stage machine sequencing everything above

pub mod archive;
pub mod downloader;
pub mod error;
pub mod http;
pub mod paths;
pub mod reconcile;
pub mod release;
pub mod state;
pub mod update;

pub mod helper;
pub mod hook;
pub mod reconciler;

pub use helper::{HelperInvocation, HelperOperation};
pub use hook::{find_post_install_hook, run_post_install_hook_if_present};
pub use reconciler::{ReconcileReport, Reconciler, DEFAULT_COPY_CONCURRENCY};

pub mod client;

pub use client::{ensure_min_disk_space, Downloader, DEFAULT_MIN_FREE_DISK_BYTES};

pub mod unpacker;

pub use unpacker::{extract_and_flatten, is_archive_file, is_zip_file};

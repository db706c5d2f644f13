pub mod model;
pub mod resolver;

pub use model::{Asset, Release};
pub use resolver::{GitHubReleaseResolver, ReleaseSource, DEFAULT_API_BASE};

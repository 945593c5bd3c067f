mod model;
mod store;

pub use model::{IndexArtifact, IndexBuildInput, IndexStatus, INDEX_FORMAT_VERSION};
pub use store::IndexStore;

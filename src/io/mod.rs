mod local_store;
mod s3_store;
mod store;

pub use local_store::LocalStorage;
pub use s3_store::{create_s3_client, S3Storage};
pub use store::{ObjectMetadata, ObjectStore, SourceRef, SourceStore};

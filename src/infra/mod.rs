//! AWS-backed implementations of the library's storage seams.

mod s3;

pub use s3::S3BlobStore;

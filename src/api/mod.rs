pub mod client;
pub mod error;
pub mod types;

pub use client::{CompressApi, CompressClient};
pub use error::ApiError;
pub use types::{
    DocumentMeta, ProcessFile, ProcessRequest, ProcessResponse, StartResponse, UploadResponse,
};

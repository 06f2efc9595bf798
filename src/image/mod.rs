//! Image types shared by ingestion, analysis and generation.

mod types;

pub use types::{split_data_url, to_data_url, GeneratedImage, ImageFormat, UploadedImage};

pub(crate) use types::new_id;

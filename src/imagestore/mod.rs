//! Client for the remote image storage service.
//!
//! The pipeline treats the store as a stateless RPC boundary: upload raw
//! bytes and get back an external id plus a public URL, or delete by
//! external id. The `ImageStore` trait is the seam the workers consume, so
//! worker logic can be exercised without a live remote.

pub mod client;

pub use client::{ImageStore, ImageStoreClient, ImageStoreError, StoredImage};

//! # Formats
//!
//! Byte-level encodings of store contents. File I/O stays in the app layer.

mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_PAYLOAD_SIZE, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes,
};

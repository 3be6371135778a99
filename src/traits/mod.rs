pub mod codec;
pub mod kv;

pub use codec::{ConvertValToEnt, DecodeBucketVal, EncodeEnt};
pub use kv::{Bucket, Cursor, KeyValue, Tx};

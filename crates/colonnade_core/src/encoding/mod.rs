//! Key & data encoding.
//!
//! Every document owns one partition, `collection#id`. Its base record sits
//! under sort key `collection`; the record of each index it takes part in
//! sits under `collection#cond1#cond2` in the same partition, so deleting a
//! document only ever touches one partition.
//!
//! ```text
//! partition_key   sort_key                   sort_value
//! book#1          book                       1
//! book#1          book#category.name         thriller
//! book#1          book#author.name#rating    Larsson#5
//! ```

mod keys;
mod value;

pub use keys::{
    decode_payload, document_id, encode_payload, id_from_partition_key, index_sort_key,
    is_index_sort_key, partition_key, KeyEncoder,
};
pub use value::{field_value, resolve_path, KeyValue};

/// Separator between the components of composite keys.
pub const SEPARATOR: char = '#';

/// Character sorting after every character a key component can hold.
///
/// Appended after a separator to an upper scan bound so that records with
/// further components still fall inside the bound.
pub const HIGH_SENTINEL: char = '\u{10FFFF}';

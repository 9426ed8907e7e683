mod bson;
mod collection;
mod errors;

pub use bson::{inserted_id, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{duplicate_key_message, is_duplicate_key_error};

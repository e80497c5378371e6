pub mod address;
pub mod assemble;
pub mod error;
pub mod ledger;
pub mod registers;
pub mod service;
pub mod types;
pub mod vlq;

#[cfg(test)]
pub mod test_util;

pub use error::CoreError;
pub use service::{MempoolView, CHUNK_SIZE};
pub use types::{Items, Paging};

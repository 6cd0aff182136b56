// Core ledger data structures

mod types;
mod transaction;
mod block;
mod merkle;
pub mod serialize;
mod hash;

pub use types::*;
pub use transaction::*;
pub use block::*;
pub use merkle::merkle_root;
pub use serialize::{fit_to_width, Serializable};
pub use hash::*;

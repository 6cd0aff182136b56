// Wallet identities

mod identity;

pub use identity::{KeyPair, SigningIdentity};

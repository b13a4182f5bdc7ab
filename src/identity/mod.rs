// Identity module - account addresses and the keypairs that own them

mod address;
mod keypair;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
pub use keypair::{Keypair, KeypairError};

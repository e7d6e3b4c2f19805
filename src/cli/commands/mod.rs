//! CLI command implementations

pub mod groom;
pub mod key;
pub mod restore;
pub mod snapshot;
pub mod stamp;

pub use groom::execute as groom;
pub use key::execute as key;
pub use restore::execute as restore;
pub use snapshot::execute as snapshot;
pub use stamp::execute as stamp;

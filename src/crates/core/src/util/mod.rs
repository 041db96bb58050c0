pub mod errors;

pub use errors::{ErrorKind, TarxError, TarxResult};

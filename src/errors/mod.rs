pub mod types;

pub use types::EtlError;

mod server;

pub use server::{FreeCadMcp, ASSET_CREATION_STRATEGY};

pub mod codec;
pub mod constants;
pub mod database;
pub mod migrations;
pub mod models;
pub mod tile_math;
pub mod tiles;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use tiles::{StoreStats, TileRow};

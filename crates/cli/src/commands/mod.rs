pub mod migrate;
pub mod model;

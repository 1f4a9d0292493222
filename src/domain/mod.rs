pub mod engine;
pub mod errors;
pub mod page;
pub mod scene;

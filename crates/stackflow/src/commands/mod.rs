pub mod create;
pub mod delete;
pub mod export;
pub mod outputs;
pub mod plan;
pub mod validate;

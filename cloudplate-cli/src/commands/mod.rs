pub mod batch;
pub mod create;
pub mod interactive;
pub mod storages;
pub mod validate;

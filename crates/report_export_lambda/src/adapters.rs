pub mod object_store;
pub mod process;
pub mod secret_store;

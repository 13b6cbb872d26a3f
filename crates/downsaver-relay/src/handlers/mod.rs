pub mod convert;
mod form;
pub mod health;
pub mod presign;

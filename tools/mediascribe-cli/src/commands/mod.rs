pub mod check;
pub mod describe;
pub mod formats;
pub mod models;
pub mod transcribe;

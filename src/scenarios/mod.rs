//! Contract scenarios shipped with the binary.

pub mod mercado;

pub use mercado::{MERCADO_BASE_URL, mercado_scenario};

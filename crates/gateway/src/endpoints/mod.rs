//! # Gatewayエンドポイント

pub mod health;
pub mod node_info;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use health::handle_health;
pub use node_info::handle_node_info;
pub use verify::handle_verify;

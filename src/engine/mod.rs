//! Pure game rules: code generation, impersonation cycles, player selection
//! and round resolution. Nothing in here touches storage or the network.

pub mod assignment;
pub mod resolution;
pub mod room_code;
pub mod selection;

//! U²-Net network definition.

mod rsu;
mod u2net;

pub use rsu::{RebnConv, RebnConvConfig, Rsu, Rsu4F, Rsu4FConfig, RsuConfig};
pub use u2net::{U2Net, U2NetConfig, U2NetOutput, U2NetRecord, U2NetSize};

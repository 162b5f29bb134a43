pub mod model;
pub mod rpc;

pub use model::*;
pub use rpc::{
    Connection, RpcId, RpcIdKnown, Status, WireError, WireResult, MAX_REQUEST_SIZE,
    MAX_RESPONSE_SIZE, MAX_STREAM_ITEM_SIZE,
};

// src/core/protocol/mod.rs

mod resp_frame;
mod resp_value;
mod stream_parser;

pub use resp_frame::{RespFrame, RespFrameCodec};
pub use resp_value::RespValue;
pub use stream_parser::{parse_stream, Payload};

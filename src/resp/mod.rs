//! RESP wire codec: a framed reader producing command argument vectors and
//! an encodable reply type. Pure protocol plumbing — no keyspace semantics.

pub mod reader;
pub mod value;

pub use reader::RespReader;
pub use value::RespValue;

//! HTTP protocol layer module
//!
//! Protocol-level helpers shared by the handlers: MIME tables, Range
//! parsing, cache validators, response builders and the file streamer.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;
pub mod stream;

// Re-export commonly used types
pub use range::{parse_range, RangeOptions, RangeOutcome};
pub use response::{
    build_304_response, build_416_response, build_options_response, json_error, json_response,
    ResponseBody,
};
pub use stream::{respond, Preconditions, StreamSource};

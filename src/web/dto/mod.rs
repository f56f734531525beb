//! Data Transfer Objects for the web API.

mod extract;
mod request;
mod response;

pub use extract::ApiQuery;
pub use request::*;
pub use response::*;

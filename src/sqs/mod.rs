//! AWS SQS wire protocol: request parsing, action dispatch, XML rendering.

pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod types;

pub use handler::SqsHandler;
pub use request::SqsRequest;
pub use server::start_sqs_server;

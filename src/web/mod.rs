pub mod query;
pub mod server;

pub use query::Query;
pub use server::{Body, HttpServer, Reply, WebState, route, start_http_server};

//! HTTP surface: route table, middleware stages and the server

pub mod alias;
pub mod chain;
pub mod compat;
pub mod dispatch;
pub mod error;
pub mod routes;
pub mod server;

pub use chain::{AliasPolicy, Chain, Dialect, Stage};
pub use dispatch::DispatchContext;
pub use error::ApiError;
pub use routes::{Endpoint, Route, RouteTable};
pub use server::ApiServer;

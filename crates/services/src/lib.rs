#![forbid(unsafe_code)]

pub mod controller;
pub mod error;
pub mod gateway;
pub mod http_gateway;
pub mod resolver;

pub use controller::{
    AdvanceOutcome, ControllerState, EntryPoint, SessionController, SessionProgress,
};
pub use error::{ControllerError, GatewayError, ResolveError};
pub use gateway::{InMemoryGateway, Page, PageRequest, SessionGateway};
pub use http_gateway::{GatewayConfig, HttpSessionGateway};
pub use resolver::{ResolvedSession, SessionOrigin, SessionResolver};

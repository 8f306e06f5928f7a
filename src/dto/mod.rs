//! DTOs de entrada del RouteManager

pub mod route_dto;
pub mod route_filter_dto;

pub use route_dto::{CreateRouteOptions, StopOptions, UpdateRouteOptions};
pub use route_filter_dto::{RouteFilter, DEFAULT_LIMIT};

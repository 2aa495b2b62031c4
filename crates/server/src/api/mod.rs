mod dfu;
mod handlers;
mod middleware;
mod routes;
mod ws;

pub use routes::create_router;

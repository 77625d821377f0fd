mod auth_handler;
mod model;
mod provisioning;
mod routes;

pub use auth_handler::*;
pub use model::*;
pub use provisioning::*;
pub use routes::init_routes;

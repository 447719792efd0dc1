pub mod gate;
pub mod handlers;
pub mod routes;

pub use gate::RedirectGate;
pub use routes::create_redirect_router;

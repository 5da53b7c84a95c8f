pub mod replay;
pub mod request_id;

pub use replay::ReplayGuard;
pub use request_id::request_id_middleware;

pub mod context;
pub mod handlers;
pub mod response;
mod routes;

pub use routes::{
    create_auth_router, create_standalone_router, create_storage_router, request_pipeline,
};

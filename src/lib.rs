mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod image;
    pub mod pagination;
    pub mod schema;
    pub mod shopping_list;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod constants;
mod handlers {
    pub mod auth;
    pub mod ingredients;
    pub mod recipes;
    pub mod reply;
    pub mod tags;
    pub mod users;
}

pub mod config;
pub mod logging;
pub mod routes;
pub mod server;
pub mod state;

pub use authentication::*;
pub use constants::*;
pub use database::*;

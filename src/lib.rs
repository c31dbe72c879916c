pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod paths;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
pub mod testing;

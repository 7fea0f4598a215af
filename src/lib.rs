#![doc = "The `taskhub` library crate."]
#![doc = ""]
#![doc = "This crate contains the authentication and session-integrity subsystem of the"]
#![doc = "TaskHub API: credential signup/login, stateless session tokens, and Google"]
#![doc = "sign-in with account linking. The binary (`main.rs`) assembles the components"]
#![doc = "declared here into a running server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

// src/lib.rs

pub mod auth;
pub mod auth_models;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod filters;
pub mod form;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod render;
pub mod session;
pub mod state;
pub mod storefront;
pub mod view;

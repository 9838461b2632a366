pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handler;
pub mod logging;
pub mod migrations;
pub mod repository;
pub mod routes;
pub mod state;
pub mod use_cases;

pub mod config;
pub mod context;
pub mod controllers;
pub mod db;
pub mod reader;
pub mod tool;
pub mod types;

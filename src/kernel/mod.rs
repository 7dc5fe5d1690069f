// src/kernel/mod.rs
pub mod ast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod runtime;
pub mod scope;
pub mod stack;
pub mod surface;
pub mod values;

pub use ast::Node;
pub use runtime::Runtime;

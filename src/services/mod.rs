pub mod ai;
pub mod email_analyzer;
pub mod engine;
pub mod extract;
pub mod query_parser;
pub mod resolver;
pub mod scheduling;
pub mod temporal;

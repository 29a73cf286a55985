pub(crate) mod lexer;
pub mod parser;

pub use parser::parse_module;

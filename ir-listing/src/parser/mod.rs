pub mod lexer;
pub mod parser;

use crate::error::ListingError;
use crate::ir::Program;

/// Главная функция парсера - из текста листинга в граф
pub fn parse(source: &str) -> Result<Program, ListingError> {
    parser::parse_tokens(lexer::Lexer::new(source))
}

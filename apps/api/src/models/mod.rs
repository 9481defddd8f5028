pub mod prompt;
pub mod selection;

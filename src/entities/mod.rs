pub mod prelude;

pub mod code_analyses;
pub mod users;

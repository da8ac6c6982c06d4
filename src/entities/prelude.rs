pub use super::code_analyses::Entity as CodeAnalyses;
pub use super::users::Entity as Users;

pub mod analysis;
pub mod user;

pub use analysis::{Analysis, AnalysisInput, InvalidTransition};
pub use user::{NewUser, User};

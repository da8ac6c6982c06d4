pub mod token;
pub use token::{Claims, IssuedToken, TokenError, TokenService};

pub mod pipeline;
pub use pipeline::{AnalysisPipeline, AnalysisRecords, PipelineJob, RunOutcome};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, AuthUser, LoginResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod analysis_service;
pub mod analysis_service_impl;
pub use analysis_service::{AnalysisError, AnalysisService};
pub use analysis_service_impl::SeaOrmAnalysisService;

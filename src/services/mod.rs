// detectAI Core Services

pub mod analysis_client;
pub mod auth;
pub mod config_store;
pub mod normalize;
pub mod session;
pub mod upload;

pub use analysis_client::{AnalysisClient, AnalysisFailure, ContentAnalyzer};
pub use auth::{Authenticator, Credentials, FormatCheckAuthenticator};
pub use config_store::{AppConfig, ConfigStore, ConfigurationError};
pub use normalize::{normalize_response, Normalized};
pub use session::{validate_payload, SessionController, SessionError, SubmitOutcome, ValidationError};
pub use upload::{guess_mime_type, kind_for_path, load_payload};

pub mod jwt;
pub mod oauth;
pub mod service;
pub mod state;

pub use oauth::OAuthOutcome;
pub use service::{AuthService, LoginOutcome};
pub use state::AuthState;

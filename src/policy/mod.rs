//! Request policies: path authorization, sessions, response headers and CORS

pub mod authorization;
pub mod cors;
pub mod headers;
pub mod pattern;
pub mod session;

pub use authorization::{AuthorizationPolicy, AuthorizationRule, Decision, ShadowedRule};
pub use cors::{CorsPolicy, PreflightCheck};
pub use headers::{HeaderMode, HeaderPolicy, HeaderRule, StandardHeaders};
pub use pattern::{MethodSet, PathPattern, RouteMatcher, RoutePattern};
pub use session::{OnFull, SessionPolicy, SessionRegistry, SessionState, SessionTicket};

pub mod csrf;
pub mod diagnostics;
pub mod form_fill;
pub mod locator;
pub mod navigation;
pub mod session;

pub use csrf::{CsrfBridge, SecurityToken};
pub use diagnostics::DiagnosticCapture;
pub use form_fill::{FillReport, FormFillEngine};
pub use locator::{LocatorResolver, Resolved};
pub use navigation::NavigationController;
pub use session::{Session, SessionManager, SessionState};

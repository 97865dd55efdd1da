//! Game Session Verification
//!
//! Everything needed to decide, without trusting the client, whether a reported
//! rally is consistent with the scoring rules.
//!
//! ## Checks
//!
//! ```text
//! Session ──► duration > 0 ──► fresh ──► score == Σ multiplier ──► bounce rate ok
//! ```
//!
//! The first failing check is reported; nothing after it is evaluated.

pub mod score;
pub mod session;
pub mod validator;

pub use score::{MultiplierCurve, SCORE_TOLERANCE, expected_score, multiplier_at};
pub use session::{Session, WalletAddress};
pub use validator::{
    Clock, SessionValidator, SystemClock, ValidationFailure, ValidationLimits, validate_session,
};

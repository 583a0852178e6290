pub mod audit;
pub mod config;
pub mod distill;
pub mod hooks;
pub mod lock;
pub mod monitor;
pub mod paths;
pub mod restore;
pub mod resume_intent;
pub mod session_id;
pub mod sessions;
pub mod state;
pub mod statusline;
pub mod summarizer;
pub mod thresholds;
pub mod transcript;
pub mod util;
pub mod validate;
pub mod warn;

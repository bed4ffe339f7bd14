mod engine;
mod generator;
mod similarity;
mod types;

pub use engine::{SelectorEngine, TextIndex, TEXT_NOT_FOUND_MESSAGE};
pub use generator::{absolute_xpath, css_escape, generate_robust_selector, resolve_xpath};
pub use similarity::similarity_ratio;
pub use types::{RepairOutcome, RobustSelector, SelectorOutcome, SelectorReport, TextMatch};

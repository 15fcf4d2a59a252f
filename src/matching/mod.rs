//! Fuzzy product matching: keyword overlap, string similarity, name
//! canonicalization, size comparison and candidate verification.

pub mod guards;
pub mod keywords;
pub mod names;
pub mod similarity;
pub mod sizes;
pub mod verify;

pub use guards::{Guard, GuardChain, GuardChainBuilder, PageFacts, QueryFacts};
pub use keywords::{best_match, fuzzy_match_score, KeywordProfile};
pub use names::{normalize_name, Taxonomy};
pub use similarity::{ratio, token_sort_ratio};
pub use sizes::{extract_sizes, sizes_match, Sizes, SIZE_TOLERANCE};
pub use verify::{verify_candidate, Verdict};

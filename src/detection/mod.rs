pub mod arbitrary;
pub mod executables;
pub mod heuristics;
pub mod homograph;
pub mod macros;
pub mod phishing;

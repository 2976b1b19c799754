pub mod error;
pub mod filter;
pub mod flood;
pub mod history;
pub mod legend;
pub mod messages;
pub mod presence;
pub mod prune;
pub mod seams;
pub mod session;

pub use error::{ChatError, ChatResult};

#[cfg(test)]
pub(crate) mod test_support;

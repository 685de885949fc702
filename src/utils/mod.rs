//! The `utils` module provides the pieces shared by every other module of
//! `topicmon`: the error taxonomy and the logging bootstrap.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;

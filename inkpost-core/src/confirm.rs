//! Injected accept/decline capability for destructive or durable steps.
//!
//! The cache, the push pipeline and the CLI never read a terminal directly;
//! they ask a [`Confirm`] implementation instead.

/// Answers a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Accepts every question. Used for `--yes` and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::debug!("auto-confirmed: {question}");
        true
    }
}

/// Declines every question.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::debug!("auto-declined: {question}");
        false
    }
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

use super::store::Slot;
use super::term::Name;
use std::fmt::{self, Display};

/// Every variant is a broken internal invariant. None of them is recovered from;
/// they abort the current reduction and surface to the caller.
#[derive(Clone, Debug, PartialEq, Eq, miette::Diagnostic)]
pub enum EngineError {
    #[diagnostic(code(pi::construction::too_few_branches))]
    TooFewBranches(usize),
    #[diagnostic(code(pi::construction::duplicate_binder))]
    DuplicateBinder(String),
    #[diagnostic(
        code(pi::construction::unknown_name),
        help("only names registered by translation or leased by the allocator have display strings")
    )]
    UnknownName(Name),

    #[diagnostic(code(pi::protocol::not_live))]
    NotLive(Slot),
    #[diagnostic(code(pi::protocol::mismatch))]
    Mismatch {
        send: (Name, usize),
        receive: (Name, usize),
    },
    #[diagnostic(code(pi::protocol::no_matching_branch))]
    NoMatchingBranch,
    #[diagnostic(
        code(pi::protocol::not_a_channel),
        help("a received value used as a channel must reduce to a plain name")
    )]
    NotAChannel(Name),

    #[diagnostic(code(pi::shape::unexpected))]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
    #[diagnostic(code(pi::pending::invalid))]
    InvalidPending(String),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewBranches(count) => {
                write!(f, "A sum needs at least two branches, got {}.", count)
            }
            Self::DuplicateBinder(name) => {
                write!(f, "Name `{}` is bound twice by the same receive.", name)
            }
            Self::UnknownName(name) => write!(f, "Name {} has no display string.", name),
            Self::NotLive(slot) => write!(f, "Process is not a member of the {} bucket.", slot),
            Self::Mismatch { send, receive } => write!(
                f,
                "Cannot communicate: send on {} with {} value(s), receive on {} with {} binder(s).",
                send.0, send.1, receive.0, receive.1
            ),
            Self::NoMatchingBranch => write!(f, "No branch of the sum can synchronize."),
            Self::NotAChannel(name) => write!(
                f,
                "Name {} is used as a channel but was replaced by a value that is not a name.",
                name
            ),
            Self::UnexpectedShape { expected, found } => {
                write!(f, "Expected {}, found {}.", expected, found)
            }
            Self::InvalidPending(shape) => {
                write!(f, "Cannot resolve an in-progress reduction holding {}.", shape)
            }
        }
    }
}

impl core::error::Error for EngineError {}

use super::names::NameAllocator;
use super::term::{Name, Process, Value};
use std::borrow::Cow;
use std::fmt::{self, Display, Write};

/// Supplies the text printed for a name.
pub trait Labels<N> {
    fn label<'a>(&'a self, name: &'a N) -> Cow<'a, str>;
}

impl Labels<Name> for NameAllocator {
    fn label<'a>(&'a self, name: &'a Name) -> Cow<'a, str> {
        NameAllocator::label(self, *name)
    }
}

/// Prints names with their own `Display`, e.g. the string names of a parsed
/// term.
pub struct Plain;

impl<N: Display> Labels<N> for Plain {
    fn label<'a>(&'a self, name: &'a N) -> Cow<'a, str> {
        Cow::Owned(name.to_string())
    }
}

pub struct Showable<'a, T: ?Sized, L>(pub &'a T, pub &'a L);

impl<'a, N, L: Labels<N>> Display for Showable<'a, Process<N>, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.pretty(f, self.1)
    }
}

impl<'a, N, L: Labels<N>> Display for Showable<'a, Value<N>, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.pretty(f, self.1)
    }
}

impl<N> Process<N> {
    /// Composite terms print their own parentheses, so any prefix can be
    /// followed by any process and the output parses back.
    pub fn pretty(&self, f: &mut impl Write, labels: &impl Labels<N>) -> fmt::Result {
        match self {
            Self::Send {
                channel,
                values,
                then,
            } => {
                write!(f, "{}<", labels.label(channel))?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    value.pretty(f, labels)?;
                }
                write!(f, ">.")?;
                then.pretty(f, labels)
            }

            Self::Receive {
                channel,
                bound,
                then,
            } => {
                write!(f, "{}(", labels.label(channel))?;
                for (i, name) in bound.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", labels.label(name))?;
                }
                write!(f, ").")?;
                then.pretty(f, labels)
            }

            Self::Restriction { bound, body } => {
                write!(f, "restrict {} in ", labels.label(bound))?;
                body.pretty(f, labels)
            }

            Self::Replication(body) => {
                write!(f, "!")?;
                body.pretty(f, labels)
            }

            Self::Sum(branches) => {
                write!(f, "(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    branch.pretty(f, labels)?;
                }
                write!(f, ")")
            }

            Self::Silent(then) => {
                write!(f, "tau.")?;
                then.pretty(f, labels)
            }

            Self::Parallel(components) => match components.as_ref() {
                [] => write!(f, "0"),
                [single] => single.pretty(f, labels),
                _ => {
                    write!(f, "(")?;
                    for (i, component) in components.iter().enumerate() {
                        if i > 0 {
                            write!(f, " | ")?;
                        }
                        component.pretty(f, labels)?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}

impl<N> Value<N> {
    pub fn pretty(&self, f: &mut impl Write, labels: &impl Labels<N>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{}", labels.label(name)),
            Self::Abstraction(bound, body) => {
                write!(f, "\\{}.", labels.label(bound))?;
                body.pretty(f, labels)
            }
            Self::Application(function, argument) => {
                match function.as_ref() {
                    Self::Abstraction(..) => {
                        write!(f, "(")?;
                        function.pretty(f, labels)?;
                        write!(f, ")")?;
                    }
                    _ => function.pretty(f, labels)?,
                }
                write!(f, " ")?;
                match argument.as_ref() {
                    Self::Var(_) => argument.pretty(f, labels),
                    _ => {
                        write!(f, "(")?;
                        argument.pretty(f, labels)?;
                        write!(f, ")")
                    }
                }
            }
        }
    }
}

use super::error::EngineError;
use std::{
    fmt::{self, Display},
    sync::Arc,
};

/// An engine-side name. Its meaning is positional; the display string lives in
/// the [`NameAllocator`](super::names::NameAllocator).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub usize);

impl Name {
    pub fn succ(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Message contents: a call-by-name lambda term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<N = Name> {
    Var(N),
    Abstraction(N, Arc<Self>),
    Application(Arc<Self>, Arc<Self>),
}

impl<N> Value<N> {
    pub fn var(name: N) -> Arc<Self> {
        Arc::new(Self::Var(name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Process<N = Name> {
    Send {
        channel: N,
        values: Arc<[Arc<Value<N>>]>,
        then: Arc<Self>,
    },
    Receive {
        channel: N,
        bound: Arc<[N]>,
        then: Arc<Self>,
    },
    Restriction {
        bound: N,
        body: Arc<Self>,
    },
    Replication(Arc<Self>),
    Sum(Branches<N>),
    Silent(Arc<Self>),
    /// Never stored by the engine; flattened as soon as it is integrated.
    /// With no components this is the inert process `0`.
    Parallel(Arc<[Arc<Self>]>),
}

/// Branches of a nondeterministic sum. There are always at least two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branches<N = Name>(Arc<[Arc<Process<N>>]>);

impl<N> Branches<N> {
    pub fn new(branches: Vec<Arc<Process<N>>>) -> Result<Self, EngineError> {
        if branches.len() < 2 {
            return Err(EngineError::TooFewBranches(branches.len()));
        }
        Ok(Self(branches.into()))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Process<N>>> {
        self.0.iter()
    }

    /// Maps every branch, keeping the branch count.
    pub fn try_map<M, E>(
        &self,
        mut f: impl FnMut(&Arc<Process<N>>) -> Result<Arc<Process<M>>, E>,
    ) -> Result<Branches<M>, E> {
        let branches = self.0.iter().map(&mut f).collect::<Result<Vec<_>, E>>()?;
        Ok(Branches(branches.into()))
    }
}

impl<N> Process<N> {
    pub fn nil() -> Self {
        Self::Parallel(Vec::new().into())
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Self::Parallel(components) => components.iter().all(|p| p.is_nil()),
            _ => false,
        }
    }

    pub fn parallel(components: Vec<Arc<Self>>) -> Self {
        Self::Parallel(components.into())
    }

    pub fn sum(branches: Vec<Arc<Self>>) -> Result<Self, EngineError> {
        Branches::new(branches).map(Self::Sum)
    }

    pub fn send(channel: N, values: Vec<Arc<Value<N>>>, then: Arc<Self>) -> Self {
        Self::Send {
            channel,
            values: values.into(),
            then,
        }
    }

    /// The bound names of a receive must be pairwise distinct.
    pub fn receive(channel: N, bound: Vec<N>, then: Arc<Self>) -> Result<Self, EngineError>
    where
        N: PartialEq + Display,
    {
        for (i, name) in bound.iter().enumerate() {
            if bound[i + 1..].contains(name) {
                return Err(EngineError::DuplicateBinder(name.to_string()));
            }
        }
        Ok(Self::Receive {
            channel,
            bound: bound.into(),
            then,
        })
    }

    /// A short tag used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Send { .. } => "a send",
            Self::Receive { .. } => "a receive",
            Self::Restriction { .. } => "a restriction",
            Self::Replication(_) => "a replication",
            Self::Sum(_) => "a sum",
            Self::Silent(_) => "a silent action",
            Self::Parallel(_) => "a parallel composition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nil() -> Arc<Process<&'static str>> {
        Arc::new(Process::nil())
    }

    #[test]
    fn sum_needs_two_branches() {
        assert_eq!(
            Process::<&str>::sum(vec![]),
            Err(EngineError::TooFewBranches(0))
        );
        assert_eq!(
            Process::sum(vec![nil()]),
            Err(EngineError::TooFewBranches(1))
        );
        assert!(Process::sum(vec![nil(), nil()]).is_ok());
    }

    #[test]
    fn receive_rejects_repeated_binders() {
        let error = Process::receive("a", vec!["x", "y", "x"], nil()).unwrap_err();
        assert_eq!(error, EngineError::DuplicateBinder("x".to_owned()));
        assert!(Process::receive("a", vec!["x", "y"], nil()).is_ok());
    }

    #[test]
    fn nested_empty_parallels_are_nil() {
        let nested = Process::parallel(vec![nil(), Arc::new(Process::parallel(vec![nil()]))]);
        assert!(nested.is_nil());
        assert!(!Process::Silent(nil()).is_nil());
    }
}

use super::term::{Name, Process};

/// Names restricted between the top of a term and the point being examined.
#[derive(Clone, Copy, Debug)]
pub enum Scope<'a> {
    Top,
    Within(Name, &'a Scope<'a>),
}

impl Scope<'_> {
    pub fn restricts(&self, name: Name) -> bool {
        match self {
            Self::Top => false,
            Self::Within(bound, outer) => *bound == name || outer.restricts(name),
        }
    }
}

/// Whether `p` and `q` have complementary send/receive halves on a channel
/// neither of them restricts.
pub fn talks_to(p: &Process, p_scope: &Scope, q: &Process, q_scope: &Scope) -> bool {
    use Process::*;

    match (p, q) {
        (
            Send {
                channel: a, values, ..
            },
            Receive {
                channel: b, bound, ..
            },
        )
        | (
            Receive {
                channel: b, bound, ..
            },
            Send {
                channel: a, values, ..
            },
        ) => {
            a == b
                && values.len() == bound.len()
                && !p_scope.restricts(*a)
                && !q_scope.restricts(*b)
        }

        (Silent(_), _) | (_, Silent(_)) => false,

        (Replication(body), _) => talks_to(body, p_scope, q, q_scope),
        (Parallel(components), _) => components
            .iter()
            .any(|component| talks_to(component, p_scope, q, q_scope)),
        (Sum(branches), _) => branches
            .iter()
            .any(|branch| talks_to(branch, p_scope, q, q_scope)),
        (Restriction { bound, body }, _) => {
            talks_to(body, &Scope::Within(*bound, p_scope), q, q_scope)
        }

        (_, Replication(body)) => talks_to(p, p_scope, body, q_scope),
        (_, Parallel(components)) => components
            .iter()
            .any(|component| talks_to(p, p_scope, component, q_scope)),
        (_, Sum(branches)) => branches
            .iter()
            .any(|branch| talks_to(p, p_scope, branch, q_scope)),
        (_, Restriction { bound, body }) => {
            talks_to(p, p_scope, body, &Scope::Within(*bound, q_scope))
        }

        (Send { .. }, Send { .. }) | (Receive { .. }, Receive { .. }) => false,
    }
}

pub fn can_talk(p: &Process, q: &Process) -> bool {
    talks_to(p, &Scope::Top, q, &Scope::Top)
}

/// Whether `process` can reduce on its own.
///
/// A replicated body that talks to itself counts: two copies of it can
/// synchronize.
pub fn has_internal_action(process: &Process) -> bool {
    match process {
        Process::Silent(_) => true,
        Process::Send { .. } | Process::Receive { .. } => false,
        Process::Restriction { body, .. } => has_internal_action(body),
        Process::Replication(body) => has_internal_action(body) || can_talk(body, body),
        Process::Sum(branches) => branches.iter().any(|branch| has_internal_action(branch)),
        Process::Parallel(components) => {
            components.iter().any(|c| has_internal_action(c))
                || components.iter().enumerate().any(|(i, a)| {
                    components[i + 1..].iter().any(|b| can_talk(a, b))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pi::term::Value;
    use std::sync::Arc;

    const A: Name = Name(0);
    const B: Name = Name(1);
    const C: Name = Name(2);

    fn nil() -> Arc<Process> {
        Arc::new(Process::nil())
    }

    fn send(channel: Name, arity: usize) -> Arc<Process> {
        let values = (0..arity).map(|_| Value::var(C)).collect();
        Arc::new(Process::send(channel, values, nil()))
    }

    fn receive(channel: Name, arity: usize) -> Arc<Process> {
        let bound = (0..arity).map(|i| Name(10 + i)).collect();
        Arc::new(Process::receive(channel, bound, nil()).unwrap())
    }

    fn restrict(bound: Name, body: Arc<Process>) -> Arc<Process> {
        Arc::new(Process::Restriction { bound, body })
    }

    #[test]
    fn matching_halves_talk_in_both_orders() {
        assert!(can_talk(&send(A, 1), &receive(A, 1)));
        assert!(can_talk(&receive(A, 1), &send(A, 1)));
    }

    #[test]
    fn channel_and_arity_must_agree() {
        assert!(!can_talk(&send(A, 1), &receive(B, 1)));
        assert!(!can_talk(&send(A, 2), &receive(A, 1)));
        assert!(!can_talk(&send(A, 0), &send(A, 0)));
    }

    #[test]
    fn restriction_hides_its_channel() {
        assert!(!can_talk(&restrict(A, send(A, 0)), &receive(A, 0)));
        assert!(!can_talk(&send(A, 0), &restrict(A, receive(A, 0))));
        assert!(can_talk(&restrict(B, send(A, 0)), &receive(A, 0)));
    }

    #[test]
    fn structure_is_looked_through() {
        let sum = Arc::new(Process::sum(vec![send(B, 0), send(A, 0)]).unwrap());
        let par = Arc::new(Process::parallel(vec![receive(C, 0), receive(A, 0)]));
        let rep = Arc::new(Process::Replication(par.clone()));
        assert!(can_talk(&sum, &par));
        assert!(can_talk(&rep, &sum));
    }

    #[test]
    fn silent_never_talks() {
        let silent = Arc::new(Process::Silent(send(A, 0)));
        assert!(!can_talk(&silent, &receive(A, 0)));
        assert!(!can_talk(&receive(A, 0), &silent));
    }

    #[test]
    fn internal_action_inside_one_scope() {
        let scoped = restrict(
            A,
            Arc::new(Process::parallel(vec![send(A, 0), receive(A, 0)])),
        );
        assert!(has_internal_action(&scoped));
        assert!(!has_internal_action(&send(A, 0)));
        assert!(has_internal_action(&Process::Silent(nil())));
    }

    #[test]
    fn sum_branches_are_alternatives_not_partners() {
        let sum = Process::sum(vec![send(A, 0), receive(A, 0)]).unwrap();
        assert!(!has_internal_action(&sum));
        assert!(has_internal_action(&Process::Replication(Arc::new(sum))));
    }
}

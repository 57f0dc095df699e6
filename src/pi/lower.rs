//! Translation of a parsed term to engine names. Every distinct string becomes
//! one [`Name`], numbered in order of first appearance.

use super::error::EngineError;
use super::names::NameAllocator;
use super::term::{Name, Process, Value};
use std::sync::Arc;

pub struct Lowered {
    pub process: Arc<Process>,
    pub names: NameAllocator,
}

pub fn lower(process: &Process<String>) -> Result<Lowered, EngineError> {
    let mut names = NameAllocator::default();
    let process = lower_process(process, &mut names)?;
    Ok(Lowered { process, names })
}

fn lower_process(
    process: &Process<String>,
    names: &mut NameAllocator,
) -> Result<Arc<Process>, EngineError> {
    Ok(Arc::new(match process {
        Process::Send {
            channel,
            values,
            then,
        } => {
            let channel = names.register(channel);
            let values = values
                .iter()
                .map(|value| lower_value(value, names))
                .collect();
            Process::send(channel, values, lower_process(then, names)?)
        }
        Process::Receive {
            channel,
            bound,
            then,
        } => {
            let channel = names.register(channel);
            let bound: Vec<Name> = bound.iter().map(|name| names.register(name)).collect();
            Process::receive(channel, bound, lower_process(then, names)?)?
        }
        Process::Restriction { bound, body } => Process::Restriction {
            bound: names.register(bound),
            body: lower_process(body, names)?,
        },
        Process::Replication(body) => Process::Replication(lower_process(body, names)?),
        Process::Sum(branches) => {
            Process::Sum(branches.try_map(|branch| lower_process(branch, names))?)
        }
        Process::Silent(then) => Process::Silent(lower_process(then, names)?),
        Process::Parallel(components) => Process::Parallel(
            components
                .iter()
                .map(|component| lower_process(component, names))
                .collect::<Result<Vec<_>, _>>()?
                .into(),
        ),
    }))
}

fn lower_value(value: &Value<String>, names: &mut NameAllocator) -> Arc<Value> {
    Arc::new(match value {
        Value::Var(name) => Value::Var(names.register(name)),
        Value::Abstraction(bound, body) => {
            Value::Abstraction(names.register(bound), lower_value(body, names))
        }
        Value::Application(function, argument) => {
            Value::Application(lower_value(function, names), lower_value(argument, names))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pi::parse::parse_process;
    use crate::pi::show::Showable;

    #[test]
    fn names_are_numbered_by_first_appearance() {
        let parsed = parse_process("b<a>.0 | a(b).c<>.0").unwrap();
        let Lowered { process, names } = lower(&parsed).unwrap();
        assert_eq!(names.lookup("b"), Some(Name(0)));
        assert_eq!(names.lookup("a"), Some(Name(1)));
        assert_eq!(names.lookup("c"), Some(Name(2)));
        assert_eq!(names.peek_next(), Name(3));
        assert_eq!(
            Showable(process.as_ref(), &names).to_string(),
            "(b<a>.0 | a(b).c<>.0)"
        );
    }

    #[test]
    fn same_string_is_the_same_name() {
        let parsed = parse_process(r"restrict x in x<\x.x>").unwrap();
        let Lowered { process, names } = lower(&parsed).unwrap();
        assert_eq!(names.len(), 1);
        let Process::Restriction { bound, body } = process.as_ref() else {
            panic!("expected a restriction");
        };
        let Process::Send { channel, values, .. } = body.as_ref() else {
            panic!("expected a send");
        };
        assert_eq!(bound, channel);
        assert_eq!(*values[0], Value::Abstraction(*bound, Value::var(*bound)));
    }
}

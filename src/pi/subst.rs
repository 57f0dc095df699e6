//! Capture-avoiding substitution for values and processes, and reduction of
//! values to weak head normal form.
//!
//! Terms are persistent: a subtree that does not mention the substituted name
//! comes back as the very same `Arc`.

use super::error::EngineError;
use super::names::NameAllocator;
use super::term::{Name, Process, Value};
use std::sync::Arc;

impl Value {
    pub fn occurs_free(&self, name: Name) -> bool {
        match self {
            Self::Var(var) => *var == name,
            Self::Abstraction(bound, body) => *bound != name && body.occurs_free(name),
            Self::Application(function, argument) => {
                function.occurs_free(name) || argument.occurs_free(name)
            }
        }
    }
}

impl Process {
    pub fn occurs_free(&self, name: Name) -> bool {
        match self {
            Self::Send {
                channel,
                values,
                then,
            } => *channel == name || values.iter().any(|v| v.occurs_free(name)) || then.occurs_free(name),
            Self::Receive {
                channel,
                bound,
                then,
            } => *channel == name || (!bound.contains(&name) && then.occurs_free(name)),
            Self::Restriction { bound, body } => *bound != name && body.occurs_free(name),
            Self::Replication(body) | Self::Silent(body) => body.occurs_free(name),
            Self::Sum(branches) => branches.iter().any(|b| b.occurs_free(name)),
            Self::Parallel(components) => components.iter().any(|c| c.occurs_free(name)),
        }
    }
}

/// Reduces to weak head normal form, call by name.
pub fn whnf(value: &Arc<Value>, names: &mut NameAllocator) -> Result<Arc<Value>, EngineError> {
    let Value::Application(function, argument) = value.as_ref() else {
        return Ok(Arc::clone(value));
    };
    let reduced_function = whnf(function, names)?;
    match reduced_function.as_ref() {
        Value::Abstraction(bound, body) => {
            let contracted = substitute_value(body, *bound, argument, names)?;
            whnf(&contracted, names)
        }
        _ => {
            let reduced_argument = whnf(argument, names)?;
            if Arc::ptr_eq(&reduced_function, function) && Arc::ptr_eq(&reduced_argument, argument) {
                Ok(Arc::clone(value))
            } else {
                Ok(Arc::new(Value::Application(reduced_function, reduced_argument)))
            }
        }
    }
}

/// `value[with/name]`
pub fn substitute_value(
    value: &Arc<Value>,
    name: Name,
    with: &Arc<Value>,
    names: &mut NameAllocator,
) -> Result<Arc<Value>, EngineError> {
    if !value.occurs_free(name) {
        return Ok(Arc::clone(value));
    }
    Ok(match value.as_ref() {
        Value::Var(_) => Arc::clone(with),
        Value::Application(function, argument) => Arc::new(Value::Application(
            substitute_value(function, name, with, names)?,
            substitute_value(argument, name, with, names)?,
        )),
        Value::Abstraction(bound, body) => {
            let (bound, body) = if with.occurs_free(*bound) {
                let fresh = names.lease(*bound)?;
                (fresh, substitute_value(body, *bound, &Value::var(fresh), names)?)
            } else {
                (*bound, Arc::clone(body))
            };
            Arc::new(Value::Abstraction(
                bound,
                substitute_value(&body, name, with, names)?,
            ))
        }
    })
}

/// `process[with/name]`
pub fn substitute(
    process: &Arc<Process>,
    name: Name,
    with: &Arc<Value>,
    names: &mut NameAllocator,
) -> Result<Arc<Process>, EngineError> {
    if !process.occurs_free(name) {
        return Ok(Arc::clone(process));
    }
    Ok(Arc::new(match process.as_ref() {
        Process::Send {
            channel,
            values,
            then,
        } => Process::Send {
            channel: substitute_channel(*channel, name, with)?,
            values: values
                .iter()
                .map(|value| substitute_value(value, name, with, names))
                .collect::<Result<Vec<_>, _>>()?
                .into(),
            then: substitute(then, name, with, names)?,
        },

        Process::Receive {
            channel,
            bound,
            then,
        } => {
            let channel = substitute_channel(*channel, name, with)?;
            if bound.contains(&name) || !then.occurs_free(name) {
                Process::Receive {
                    channel,
                    bound: Arc::clone(bound),
                    then: Arc::clone(then),
                }
            } else {
                let mut renamed = Vec::with_capacity(bound.len());
                let mut then = Arc::clone(then);
                for &binder in bound.iter() {
                    if with.occurs_free(binder) {
                        let fresh = names.lease(binder)?;
                        then = rename(&then, binder, fresh, names)?;
                        renamed.push(fresh);
                    } else {
                        renamed.push(binder);
                    }
                }
                Process::Receive {
                    channel,
                    bound: renamed.into(),
                    then: substitute(&then, name, with, names)?,
                }
            }
        }

        Process::Restriction { bound, body } => {
            let (bound, body) = if with.occurs_free(*bound) {
                let fresh = names.lease(*bound)?;
                (fresh, rename(body, *bound, fresh, names)?)
            } else {
                (*bound, Arc::clone(body))
            };
            Process::Restriction {
                bound,
                body: substitute(&body, name, with, names)?,
            }
        }

        Process::Replication(body) => Process::Replication(substitute(body, name, with, names)?),
        Process::Silent(then) => Process::Silent(substitute(then, name, with, names)?),
        Process::Sum(branches) => {
            Process::Sum(branches.try_map(|branch| substitute(branch, name, with, names))?)
        }
        Process::Parallel(components) => Process::Parallel(
            components
                .iter()
                .map(|component| substitute(component, name, with, names))
                .collect::<Result<Vec<_>, _>>()?
                .into(),
        ),
    }))
}

/// Alpha-renames free occurrences of `from` to `to`. `to` must be unused in
/// `process`, so no binder ever needs renaming along the way.
pub fn rename(
    process: &Arc<Process>,
    from: Name,
    to: Name,
    names: &mut NameAllocator,
) -> Result<Arc<Process>, EngineError> {
    substitute(process, from, &Value::var(to), names)
}

/// Replaces every `bound[i]` by `values[i]` at once.
///
/// The binders are first moved onto a scratch block of names, so a value that
/// mentions a binder not yet substituted is never captured by a later step.
pub fn substitute_simultaneous(
    process: &Arc<Process>,
    bound: &[Name],
    values: &[Arc<Value>],
    names: &mut NameAllocator,
) -> Result<Arc<Process>, EngineError> {
    let scratch = names.scratch(bound.len());
    let mut process = Arc::clone(process);
    for (&binder, &temporary) in bound.iter().zip(&scratch) {
        process = rename(&process, binder, temporary, names)?;
    }
    for (&temporary, value) in scratch.iter().zip(values) {
        process = substitute(&process, temporary, value, names)?;
    }
    Ok(process)
}

fn substitute_channel(channel: Name, name: Name, with: &Value) -> Result<Name, EngineError> {
    if channel != name {
        return Ok(channel);
    }
    match with {
        Value::Var(replacement) => Ok(*replacement),
        _ => Err(EngineError::NotAChannel(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(strings: &[&str]) -> (NameAllocator, Vec<Name>) {
        let mut names = NameAllocator::default();
        let registered = strings.iter().map(|s| names.register(s)).collect();
        (names, registered)
    }

    fn lambda(bound: Name, body: Arc<Value>) -> Arc<Value> {
        Arc::new(Value::Abstraction(bound, body))
    }

    fn apply(function: Arc<Value>, argument: Arc<Value>) -> Arc<Value> {
        Arc::new(Value::Application(function, argument))
    }

    fn nil() -> Arc<Process> {
        Arc::new(Process::nil())
    }

    #[test]
    fn beta_reduces_to_weak_head_normal_form() {
        let (mut names, n) = allocator(&["x", "y", "k"]);
        let (x, y, k) = (n[0], n[1], n[2]);
        // (\x.\y.x) k  ~>  \y.k
        let term = apply(lambda(x, lambda(y, Value::var(x))), Value::var(k));
        let reduced = whnf(&term, &mut names).unwrap();
        assert_eq!(*reduced, Value::Abstraction(y, Value::var(k)));
    }

    #[test]
    fn whnf_stops_under_lambda() {
        let (mut names, n) = allocator(&["x", "y"]);
        let (x, y) = (n[0], n[1]);
        let redex = apply(lambda(y, Value::var(y)), Value::var(x));
        let term = lambda(x, redex);
        let reduced = whnf(&term, &mut names).unwrap();
        assert!(Arc::ptr_eq(&reduced, &term));
    }

    #[test]
    fn whnf_is_idempotent() {
        let (mut names, n) = allocator(&["f", "x", "y"]);
        let (f, x, y) = (n[0], n[1], n[2]);
        // f ((\x.x) y)  ~>  f y
        let term = apply(Value::var(f), apply(lambda(x, Value::var(x)), Value::var(y)));
        let once = whnf(&term, &mut names).unwrap();
        let twice = whnf(&once, &mut names).unwrap();
        assert_eq!(once, twice);
        assert!(Arc::ptr_eq(&once, &twice));
        assert_eq!(*once, Value::Application(Value::var(f), Value::var(y)));
    }

    #[test]
    fn value_substitution_avoids_capture() {
        let (mut names, n) = allocator(&["x", "y"]);
        let (x, y) = (n[0], n[1]);
        // (\y.x)[y/x]  =  \y'.y
        let term = lambda(y, Value::var(x));
        let result = substitute_value(&term, x, &Value::var(y), &mut names).unwrap();
        let Value::Abstraction(bound, body) = result.as_ref() else {
            panic!("expected an abstraction, got {:?}", result);
        };
        assert_ne!(*bound, y);
        assert_eq!(names.display(*bound), Some("y'"));
        assert_eq!(**body, Value::Var(y));
    }

    #[test]
    fn receive_shields_its_binders() {
        let (mut names, n) = allocator(&["a", "x", "z"]);
        let (a, x, z) = (n[0], n[1], n[2]);
        let body = Arc::new(Process::send(x, vec![], nil()));
        let term = Arc::new(Process::receive(a, vec![x], body).unwrap());
        let result = substitute(&term, x, &Value::var(z), &mut names).unwrap();
        assert!(Arc::ptr_eq(&result, &term));
    }

    #[test]
    fn receive_channel_is_substituted() {
        let (mut names, n) = allocator(&["a", "b", "x"]);
        let (a, b, x) = (n[0], n[1], n[2]);
        let term = Arc::new(Process::receive(a, vec![x], nil()).unwrap());
        let result = substitute(&term, a, &Value::var(b), &mut names).unwrap();
        assert!(matches!(result.as_ref(), Process::Receive { channel, .. } if *channel == b));
    }

    #[test]
    fn restriction_is_alpha_renamed_when_at_risk() {
        let (mut names, n) = allocator(&["c", "x"]);
        let (c, x) = (n[0], n[1]);
        // (restrict c in x<c>)[c/x]  =  restrict c' in c<c'>
        let body = Arc::new(Process::send(x, vec![Value::var(c)], nil()));
        let term = Arc::new(Process::Restriction { bound: c, body });
        let result = substitute(&term, x, &Value::var(c), &mut names).unwrap();
        let Process::Restriction { bound, body } = result.as_ref() else {
            panic!("expected a restriction");
        };
        assert_eq!(names.display(*bound), Some("c'"));
        let Process::Send {
            channel, values, ..
        } = body.as_ref()
        else {
            panic!("expected a send");
        };
        assert_eq!(*channel, c);
        assert_eq!(*values[0], Value::Var(*bound));
    }

    #[test]
    fn restriction_of_the_same_name_is_left_alone() {
        let (mut names, n) = allocator(&["c", "d"]);
        let (c, d) = (n[0], n[1]);
        let body = Arc::new(Process::send(c, vec![], nil()));
        let term = Arc::new(Process::Restriction { bound: c, body });
        let result = substitute(&term, c, &Value::var(d), &mut names).unwrap();
        assert!(Arc::ptr_eq(&result, &term));
    }

    #[test]
    fn simultaneous_substitution_swaps_names() {
        let (mut names, n) = allocator(&["x", "y", "out"]);
        let (x, y, out) = (n[0], n[1], n[2]);
        // out<x, y>[y/x, x/y]  =  out<y, x>
        let term = Arc::new(Process::send(out, vec![Value::var(x), Value::var(y)], nil()));
        let result =
            substitute_simultaneous(&term, &[x, y], &[Value::var(y), Value::var(x)], &mut names)
                .unwrap();
        let Process::Send { values, .. } = result.as_ref() else {
            panic!("expected a send");
        };
        assert_eq!(*values[0], Value::Var(y));
        assert_eq!(*values[1], Value::Var(x));
    }

    #[test]
    fn abstraction_in_channel_position_is_rejected() {
        let (mut names, n) = allocator(&["a", "x"]);
        let (a, x) = (n[0], n[1]);
        let term = Arc::new(Process::send(a, vec![], nil()));
        let error = substitute(&term, a, &lambda(x, Value::var(x)), &mut names).unwrap_err();
        assert_eq!(error, EngineError::NotAChannel(a));
    }
}

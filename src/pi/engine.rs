//! The small-step interpreter.
//!
//! Each call to [`Interpreter::step`] performs exactly one reduction, chosen at
//! random among the enabled ones. A reduction that has to unwrap structure
//! before it can fire (a sum picking a branch, a parallel picking a
//! synchronizing pair) is held in [`Pending`] and finished over the following
//! steps before anything else may run.

use super::error::EngineError;
use super::names::NameAllocator;
use super::show::Showable;
use super::store::{Entry, EntryId, Kind, Mode, Slot, Store};
use super::subst::{rename, substitute_simultaneous, whnf};
use super::sync::{can_talk, has_internal_action};
use super::term::{Name, Process};
use indexmap::IndexSet;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::fmt::{self, Display};
use std::sync::Arc;
use tracing::{debug, trace};

const SEND: Slot = Slot::free(Kind::Send);
const RECEIVE: Slot = Slot::free(Kind::Receive);
const RESTRICTION: Slot = Slot::free(Kind::Restriction);
const SUM: Slot = Slot::free(Kind::Sum);

/// A reduction that has been started and not yet completed.
#[derive(Clone, Debug, Default)]
pub enum Pending {
    #[default]
    Idle,
    /// Being narrowed down to a literal send/receive pair.
    Pair(Arc<Process>, Arc<Process>),
    /// Being narrowed down to its own internal action.
    Single(Arc<Process>),
}

/// One entry of the pool drawn from when no free send/receive pair talks.
#[derive(Clone, Copy, Debug)]
enum Reduction {
    Cross(Slot, Slot),
    Silent(Mode),
    SumInternal,
    RestrictionInternal,
    ReplicatedInternal,
}

pub struct Interpreter<R = StdRng> {
    store: Store,
    pending: Pending,
    names: NameAllocator,
    extruded: IndexSet<Name>,
    rng: R,
}

impl Interpreter<StdRng> {
    pub fn new(term: Arc<Process>, names: NameAllocator) -> Result<Self, EngineError> {
        Self::with_rng(term, names, StdRng::from_entropy())
    }

    /// Same term and seed, same trace.
    pub fn seeded(term: Arc<Process>, names: NameAllocator, seed: u64) -> Result<Self, EngineError> {
        Self::with_rng(term, names, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Interpreter<R> {
    /// Integrates `term` and opens every restriction at its top level. An
    /// opened restriction keeps its own name unless that name is already free
    /// somewhere else in the state.
    pub fn with_rng(term: Arc<Process>, names: NameAllocator, rng: R) -> Result<Self, EngineError> {
        let mut interpreter = Self {
            store: Store::default(),
            pending: Pending::Idle,
            names,
            extruded: IndexSet::new(),
            rng,
        };
        interpreter.store.integrate(term);

        while let Some(entry) = interpreter.store.bucket(RESTRICTION).first().cloned() {
            let process = interpreter.store.remove(RESTRICTION, entry.id)?;
            let Process::Restriction { bound, body } = process.as_ref() else {
                return Err(unexpected("a restriction", &process));
            };
            let clashes = interpreter.extruded.contains(bound)
                || interpreter
                    .store
                    .entries()
                    .any(|(_, entry)| entry.process.occurs_free(*bound));
            let body = if clashes {
                interpreter.open_scope(&process)?
            } else {
                interpreter.extruded.insert(*bound);
                Arc::clone(body)
            };
            interpreter.store.integrate(body);
        }

        Ok(interpreter)
    }

    /// Performs one reduction. `Ok(false)` means the state is in normal form.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        if !matches!(self.pending, Pending::Idle) {
            self.resolve_pending()?;
            return Ok(true);
        }

        let pairs = self.talking_pairs(SEND, RECEIVE);
        if let Some((send, receive)) = pairs.choose(&mut self.rng) {
            let (send, receive) = (send.id, receive.id);
            self.communicate(send, receive)?;
            return Ok(true);
        }

        let mut pool = pool();
        while !pool.is_empty() {
            let reduction = pool.swap_remove(self.rng.gen_range(0..pool.len()));
            trace!(?reduction, "drawn from pool");
            if self.attempt(reduction)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Steps until normal form or until `max_steps` reductions have been
    /// performed, returning how many were.
    pub fn run(&mut self, max_steps: Option<usize>) -> Result<usize, EngineError> {
        let mut steps = 0;
        while max_steps.map_or(true, |max| steps < max) && self.step()? {
            steps += 1;
        }
        Ok(steps)
    }

    fn attempt(&mut self, reduction: Reduction) -> Result<bool, EngineError> {
        match reduction {
            Reduction::Cross(a, b) => {
                let pairs = self.talking_pairs(a, b);
                let Some((x, y)) = pairs.choose(&mut self.rng).cloned() else {
                    return Ok(false);
                };
                self.cross((a, x), (b, y))?;
            }

            Reduction::Silent(mode) => {
                let slot = Slot { kind: Kind::Silent, mode };
                let Some(entry) = self.store.bucket(slot).choose(&mut self.rng).cloned() else {
                    return Ok(false);
                };
                let process = match mode {
                    Mode::Free => self.store.remove(slot, entry.id)?,
                    Mode::Replicated => entry.process,
                };
                let Process::Silent(then) = process.as_ref() else {
                    return Err(unexpected("a silent action", &process));
                };
                debug!(mode = ?mode, then = %self.show(then), "silent action");
                self.store.integrate(Arc::clone(then));
            }

            Reduction::SumInternal => {
                let Some(entry) = self.choose_entry(SUM, |p| has_internal_action(p)) else {
                    return Ok(false);
                };
                let sum = self.store.remove(SUM, entry.id)?;
                self.internal_branch(&sum)?;
            }

            Reduction::RestrictionInternal => {
                let Some(entry) = self.choose_entry(RESTRICTION, |p| has_internal_action(p)) else {
                    return Ok(false);
                };
                self.extrude(entry.id)?;
            }

            Reduction::ReplicatedInternal => {
                let candidates: Vec<Entry> = Slot::all()
                    .filter(|slot| slot.mode == Mode::Replicated && slot.kind != Kind::Silent)
                    .flat_map(|slot| self.store.bucket(slot).iter())
                    .filter(|entry| {
                        has_internal_action(&entry.process)
                            || can_talk(&entry.process, &entry.process)
                    })
                    .cloned()
                    .collect();
                let Some(entry) = candidates.choose(&mut self.rng) else {
                    return Ok(false);
                };
                let template = Arc::clone(&entry.process);
                self.copy(&template);
            }
        }
        Ok(true)
    }

    /// Every talking pair drawn from buckets `a` and `b`. Within one bucket a
    /// free entry is never paired with itself, but a replicated template is:
    /// each use of it is a fresh copy.
    fn talking_pairs(&self, a: Slot, b: Slot) -> Vec<(Entry, Entry)> {
        let mut pairs = Vec::new();
        for (i, x) in self.store.bucket(a).iter().enumerate() {
            for (j, y) in self.store.bucket(b).iter().enumerate() {
                if a == b && (j < i || (j == i && a.mode == Mode::Free)) {
                    continue;
                }
                if can_talk(&x.process, &y.process) {
                    pairs.push((x.clone(), y.clone()));
                }
            }
        }
        pairs
    }

    fn choose_entry(&mut self, slot: Slot, filter: impl Fn(&Process) -> bool) -> Option<Entry> {
        let candidates: Vec<&Entry> = self
            .store
            .bucket(slot)
            .iter()
            .filter(|entry| filter(&entry.process))
            .collect();
        candidates.choose(&mut self.rng).map(|entry| (*entry).clone())
    }

    fn cross(&mut self, (a, x): (Slot, Entry), (b, y): (Slot, Entry)) -> Result<(), EngineError> {
        if b.mode == Mode::Replicated {
            self.copy(&y.process);
        } else if a.mode == Mode::Replicated {
            self.copy(&x.process);
        } else if a.kind == Kind::Restriction {
            self.extrude(x.id)?;
        } else if b.kind == Kind::Restriction {
            self.extrude(y.id)?;
        } else if a.kind == Kind::Sum {
            self.select(x.id, b, y.id)?;
        } else if b.kind == Kind::Sum {
            self.select(y.id, a, x.id)?;
        } else if a.kind == Kind::Send {
            self.communicate(x.id, y.id)?;
        } else {
            self.communicate(y.id, x.id)?;
        }
        Ok(())
    }

    fn copy(&mut self, template: &Arc<Process>) {
        debug!(template = %self.show(template), "copied replicated process");
        self.store.integrate(Arc::clone(template));
    }

    /// Nothing is removed from the store unless the pair agrees on channel
    /// and arity.
    fn communicate(&mut self, send: EntryId, receive: EntryId) -> Result<(), EngineError> {
        let sender = self.store.get(SEND, send).ok_or(EngineError::NotLive(SEND))?;
        let receiver = self
            .store
            .get(RECEIVE, receive)
            .ok_or(EngineError::NotLive(RECEIVE))?;
        agree(sender, receiver)?;
        let send = self.store.remove(SEND, send)?;
        let receive = self.store.remove(RECEIVE, receive)?;
        self.exchange(&send, &receive)
    }

    /// Passes the message of `send` to `receive`. Neither is in the store.
    fn exchange(&mut self, send: &Arc<Process>, receive: &Arc<Process>) -> Result<(), EngineError> {
        agree(send, receive)?;
        let Process::Send {
            channel: send_channel,
            values,
            then: sender_then,
        } = send.as_ref()
        else {
            return Err(unexpected("a send", send));
        };
        let Process::Receive {
            bound,
            then: receiver_then,
            ..
        } = receive.as_ref()
        else {
            return Err(unexpected("a receive", receive));
        };

        debug!(
            channel = %self.names.label(*send_channel),
            send = %self.show(send),
            receive = %self.show(receive),
            "communicated"
        );

        self.store.integrate(Arc::clone(sender_then));
        let values = values
            .iter()
            .map(|value| whnf(value, &mut self.names))
            .collect::<Result<Vec<_>, _>>()?;
        let continuation = substitute_simultaneous(receiver_then, bound, &values, &mut self.names)?;
        self.store.integrate(continuation);
        Ok(())
    }

    /// Widens the scope of `restriction` to the whole state under a fresh name
    /// and returns its renamed body.
    fn open_scope(&mut self, restriction: &Arc<Process>) -> Result<Arc<Process>, EngineError> {
        let Process::Restriction { bound, body } = restriction.as_ref() else {
            return Err(unexpected("a restriction", restriction));
        };
        let fresh = self.names.lease(*bound)?;
        let body = rename(body, *bound, fresh, &mut self.names)?;
        self.extruded.insert(fresh);
        debug!(
            from = %self.names.label(*bound),
            to = %self.names.label(fresh),
            "extruded scope"
        );
        Ok(body)
    }

    fn extrude(&mut self, restriction: EntryId) -> Result<(), EngineError> {
        let restriction = self.store.remove(RESTRICTION, restriction)?;
        let body = self.open_scope(&restriction)?;
        self.store.integrate(body);
        Ok(())
    }

    /// Commits `sum` to a branch that talks to `other` and holds the two as a
    /// pending pair.
    fn select(&mut self, sum: EntryId, other_slot: Slot, other: EntryId) -> Result<(), EngineError> {
        let sum = self.store.remove(SUM, sum)?;
        let other = self.store.remove(other_slot, other)?;
        let Process::Sum(branches) = sum.as_ref() else {
            return Err(unexpected("a sum", &sum));
        };
        let talking: Vec<_> = branches
            .iter()
            .filter(|branch| can_talk(branch, &other))
            .collect();
        let branch = talking
            .choose(&mut self.rng)
            .map(|branch| Arc::clone(branch))
            .ok_or(EngineError::NoMatchingBranch)?;
        debug!(branch = %self.show(&branch), other = %self.show(&other), "selected branch");
        self.pending = Pending::Pair(branch, other);
        Ok(())
    }

    /// Commits `sum` to a branch with an internal action. A silent branch
    /// completes at once; any other is held until its action completes.
    fn internal_branch(&mut self, sum: &Arc<Process>) -> Result<(), EngineError> {
        let Process::Sum(branches) = sum.as_ref() else {
            return Err(unexpected("a sum", sum));
        };
        let internal: Vec<_> = branches
            .iter()
            .filter(|branch| has_internal_action(branch))
            .collect();
        let branch = internal
            .choose(&mut self.rng)
            .map(|branch| Arc::clone(branch))
            .ok_or(EngineError::NoMatchingBranch)?;
        debug!(branch = %self.show(&branch), "selected internal branch");
        match branch.as_ref() {
            Process::Silent(then) => self.store.integrate(Arc::clone(then)),
            _ => self.pending = Pending::Single(Arc::clone(&branch)),
        }
        Ok(())
    }

    fn resolve_pending(&mut self) -> Result<(), EngineError> {
        match std::mem::take(&mut self.pending) {
            Pending::Idle => Ok(()),
            Pending::Pair(left, right) => {
                trace!(left = %self.show(&left), right = %self.show(&right), "resolving pair");
                self.pending = self.resolve_pair(left, right)?;
                Ok(())
            }
            Pending::Single(process) => {
                trace!(process = %self.show(&process), "resolving single");
                self.pending = self.resolve_single(process)?;
                Ok(())
            }
        }
    }

    fn resolve_pair(&mut self, left: Arc<Process>, right: Arc<Process>) -> Result<Pending, EngineError> {
        match (left.as_ref(), right.as_ref()) {
            (Process::Send { .. }, Process::Receive { .. }) => {
                self.exchange(&left, &right)?;
                Ok(Pending::Idle)
            }
            (Process::Receive { .. }, Process::Send { .. }) => {
                self.exchange(&right, &left)?;
                Ok(Pending::Idle)
            }
            (Process::Send { .. } | Process::Receive { .. }, Process::Send { .. } | Process::Receive { .. }) => {
                Err(EngineError::InvalidPending(format!(
                    "{} paired with {}",
                    left.shape(),
                    right.shape()
                )))
            }
            (Process::Send { .. } | Process::Receive { .. }, _) => {
                Ok(Pending::Pair(Arc::clone(&right), Arc::clone(&left)))
            }

            (Process::Sum(branches), _) => {
                let talking: Vec<_> = branches
                    .iter()
                    .filter(|branch| can_talk(branch, &right))
                    .collect();
                let branch = talking
                    .choose(&mut self.rng)
                    .map(|branch| Arc::clone(branch))
                    .ok_or(EngineError::NoMatchingBranch)?;
                Ok(Pending::Pair(branch, Arc::clone(&right)))
            }

            (Process::Parallel(components), _) => {
                let talking: Vec<usize> = (0..components.len())
                    .filter(|&i| can_talk(&components[i], &right))
                    .collect();
                let &chosen = talking
                    .choose(&mut self.rng)
                    .ok_or(EngineError::NoMatchingBranch)?;
                for (i, component) in components.iter().enumerate() {
                    if i != chosen {
                        self.store.integrate(Arc::clone(component));
                    }
                }
                Ok(Pending::Pair(Arc::clone(&components[chosen]), Arc::clone(&right)))
            }

            (Process::Replication(body), _) => {
                self.store.integrate(Arc::clone(&left));
                Ok(Pending::Pair(Arc::clone(body), Arc::clone(&right)))
            }

            (Process::Restriction { .. }, _) => {
                let body = self.open_scope(&left)?;
                Ok(Pending::Pair(body, Arc::clone(&right)))
            }

            (Process::Silent(_), _) => Err(EngineError::InvalidPending(format!(
                "{} paired with {}",
                left.shape(),
                right.shape()
            ))),
        }
    }

    fn resolve_single(&mut self, process: Arc<Process>) -> Result<Pending, EngineError> {
        match process.as_ref() {
            Process::Parallel(components) => {
                let mut choices = Vec::new();
                for (i, a) in components.iter().enumerate() {
                    if has_internal_action(a) {
                        choices.push((i, None));
                    }
                    for (j, b) in components.iter().enumerate().skip(i + 1) {
                        if can_talk(a, b) {
                            choices.push((i, Some(j)));
                        }
                    }
                }
                let &(i, j) = choices
                    .choose(&mut self.rng)
                    .ok_or_else(|| EngineError::InvalidPending(process.shape().to_owned()))?;
                for (k, component) in components.iter().enumerate() {
                    if k != i && Some(k) != j {
                        self.store.integrate(Arc::clone(component));
                    }
                }
                Ok(match j {
                    Some(j) => Pending::Pair(Arc::clone(&components[i]), Arc::clone(&components[j])),
                    None => Pending::Single(Arc::clone(&components[i])),
                })
            }

            Process::Restriction { .. } => Ok(Pending::Single(self.open_scope(&process)?)),

            Process::Replication(body) => {
                self.store.integrate(Arc::clone(&process));
                if has_internal_action(body) {
                    Ok(Pending::Single(Arc::clone(body)))
                } else {
                    Ok(Pending::Pair(Arc::clone(body), Arc::clone(body)))
                }
            }

            Process::Sum(branches) => {
                let internal: Vec<_> = branches
                    .iter()
                    .filter(|branch| has_internal_action(branch))
                    .collect();
                let branch = internal
                    .choose(&mut self.rng)
                    .map(|branch| Arc::clone(branch))
                    .ok_or(EngineError::NoMatchingBranch)?;
                Ok(Pending::Single(branch))
            }

            Process::Silent(then) => {
                debug!(then = %self.show(then), "silent action");
                self.store.integrate(Arc::clone(then));
                Ok(Pending::Idle)
            }

            Process::Send { .. } | Process::Receive { .. } => {
                Err(EngineError::InvalidPending(process.shape().to_owned()))
            }
        }
    }
}

impl<R> Interpreter<R> {
    /// The textual form of the current state.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Whether an indivisible reduction is still in progress.
    pub fn is_resolving(&self) -> bool {
        !matches!(self.pending, Pending::Idle)
    }

    pub fn extruded(&self) -> &IndexSet<Name> {
        &self.extruded
    }

    fn show<'a>(&'a self, process: &'a Process) -> Showable<'a, Process, NameAllocator> {
        Showable(process, &self.names)
    }
}

impl<R> Display for Interpreter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.extruded.is_empty() {
            write!(f, "restrict ")?;
            for (i, name) in self.extruded.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.names.label(*name))?;
            }
            write!(f, " in ")?;
        }

        write!(f, "[ ")?;
        if self.store.is_empty() {
            write!(f, "0")?;
        }
        for (i, (slot, entry)) in self.store.entries().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            if slot.mode == Mode::Replicated {
                write!(f, "!")?;
            }
            entry.process.pretty(f, &self.names)?;
        }
        write!(f, " ]")?;

        match &self.pending {
            Pending::Idle => Ok(()),
            Pending::Pair(left, right) => {
                write!(f, " <| {} ~ {} |>", self.show(left), self.show(right))
            }
            Pending::Single(process) => write!(f, " <| {} |>", self.show(process)),
        }
    }
}

/// Every cross-bucket pairing except free send with free receive, which is
/// tried before the pool, plus the internal kinds.
fn pool() -> Vec<Reduction> {
    let slots: Vec<Slot> = Slot::all().filter(|slot| slot.kind != Kind::Silent).collect();
    let mut pool = Vec::new();
    for (i, &a) in slots.iter().enumerate() {
        for &b in &slots[i..] {
            if (a, b) != (SEND, RECEIVE) {
                pool.push(Reduction::Cross(a, b));
            }
        }
    }
    pool.extend([
        Reduction::Silent(Mode::Free),
        Reduction::Silent(Mode::Replicated),
        Reduction::SumInternal,
        Reduction::RestrictionInternal,
        Reduction::ReplicatedInternal,
    ]);
    pool
}

/// Checks that `send` and `receive` are a send and a receive on the same
/// channel with the same arity.
fn agree(send: &Process, receive: &Process) -> Result<(), EngineError> {
    let Process::Send { channel, values, .. } = send else {
        return Err(unexpected("a send", send));
    };
    let Process::Receive {
        channel: receive_channel,
        bound,
        ..
    } = receive
    else {
        return Err(unexpected("a receive", receive));
    };
    if channel != receive_channel || values.len() != bound.len() {
        return Err(EngineError::Mismatch {
            send: (*channel, values.len()),
            receive: (*receive_channel, bound.len()),
        });
    }
    Ok(())
}

fn unexpected(expected: &'static str, found: &Process) -> EngineError {
    EngineError::UnexpectedShape {
        expected,
        found: found.shape(),
    }
}

use super::error::EngineError;
use super::term::Process;
use std::fmt::{self, Display};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Send,
    Receive,
    Restriction,
    Sum,
    Silent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Free,
    Replicated,
}

/// One of the ten buckets of the live multiset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    pub kind: Kind,
    pub mode: Mode,
}

impl Kind {
    pub const ALL: [Kind; 5] = [
        Kind::Send,
        Kind::Receive,
        Kind::Restriction,
        Kind::Sum,
        Kind::Silent,
    ];
}

impl Slot {
    pub const fn free(kind: Kind) -> Self {
        Self {
            kind,
            mode: Mode::Free,
        }
    }

    pub const fn replicated(kind: Kind) -> Self {
        Self {
            kind,
            mode: Mode::Replicated,
        }
    }

    /// Free buckets first, in [`Kind::ALL`] order, then the replicated ones.
    pub fn all() -> impl Iterator<Item = Slot> {
        [Mode::Free, Mode::Replicated]
            .into_iter()
            .flat_map(|mode| Kind::ALL.into_iter().map(move |kind| Slot { kind, mode }))
    }

    fn index(self) -> usize {
        let kind = match self.kind {
            Kind::Send => 0,
            Kind::Receive => 1,
            Kind::Restriction => 2,
            Kind::Sum => 3,
            Kind::Silent => 4,
        };
        match self.mode {
            Mode::Free => kind,
            Mode::Replicated => kind + 5,
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Free => "free",
            Mode::Replicated => "replicated",
        };
        let kind = match self.kind {
            Kind::Send => "send",
            Kind::Receive => "receive",
            Kind::Restriction => "restriction",
            Kind::Sum => "sum",
            Kind::Silent => "silent",
        };
        write!(f, "{} {}", mode, kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// A member of the live multiset. Copies of one replicated template share the
/// same `process` but get distinct ids.
#[derive(Clone, Debug)]
pub struct Entry {
    pub id: EntryId,
    pub process: Arc<Process>,
}

#[derive(Debug, Default)]
pub struct Store {
    buckets: [Vec<Entry>; 10],
    next_id: usize,
}

impl Store {
    /// Files `process` into its buckets. Parallel compositions are flattened
    /// and replications unwrapped into the replicated buckets.
    pub fn integrate(&mut self, process: Arc<Process>) {
        let kind = match process.as_ref() {
            Process::Parallel(components) => {
                for component in components.iter() {
                    self.integrate(Arc::clone(component));
                }
                return;
            }
            Process::Replication(body) => {
                self.integrate_replicated(Arc::clone(body));
                return;
            }
            Process::Send { .. } => Kind::Send,
            Process::Receive { .. } => Kind::Receive,
            Process::Restriction { .. } => Kind::Restriction,
            Process::Sum(_) => Kind::Sum,
            Process::Silent(_) => Kind::Silent,
        };
        self.push(Slot::free(kind), process);
    }

    fn integrate_replicated(&mut self, body: Arc<Process>) {
        let kind = match body.as_ref() {
            Process::Parallel(components) => {
                for component in components.iter() {
                    self.integrate_replicated(Arc::clone(component));
                }
                return;
            }
            Process::Replication(inner) => {
                self.integrate_replicated(Arc::clone(inner));
                return;
            }
            Process::Send { .. } => Kind::Send,
            Process::Receive { .. } => Kind::Receive,
            Process::Restriction { .. } => Kind::Restriction,
            Process::Sum(_) => Kind::Sum,
            Process::Silent(_) => Kind::Silent,
        };
        let slot = Slot::replicated(kind);
        if self.buckets[slot.index()]
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.process, &body))
        {
            return;
        }
        self.push(slot, body);
    }

    fn push(&mut self, slot: Slot, process: Arc<Process>) {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.buckets[slot.index()].push(Entry { id, process });
    }

    pub fn bucket(&self, slot: Slot) -> &[Entry] {
        &self.buckets[slot.index()]
    }

    /// Takes a member out of `slot`, keeping the order of the rest.
    pub fn remove(&mut self, slot: Slot, id: EntryId) -> Result<Arc<Process>, EngineError> {
        let bucket = &mut self.buckets[slot.index()];
        let position = bucket
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(EngineError::NotLive(slot))?;
        Ok(bucket.remove(position).process)
    }

    pub fn get(&self, slot: Slot, id: EntryId) -> Option<&Arc<Process>> {
        self.bucket(slot)
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.process)
    }

    #[cfg(test)]
    pub fn contains(&self, slot: Slot, id: EntryId) -> bool {
        self.get(slot, id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Slot, &Entry)> {
        Slot::all().flat_map(move |slot| self.bucket(slot).iter().map(move |entry| (slot, entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pi::term::Name;

    fn nil() -> Arc<Process> {
        Arc::new(Process::nil())
    }

    fn send(channel: usize) -> Arc<Process> {
        Arc::new(Process::send(Name(channel), vec![], nil()))
    }

    fn receive(channel: usize) -> Arc<Process> {
        Arc::new(Process::receive(Name(channel), vec![], nil()).unwrap())
    }

    #[test]
    fn parallel_is_flattened() {
        let mut store = Store::default();
        let inner = Arc::new(Process::parallel(vec![receive(1), nil()]));
        store.integrate(Arc::new(Process::parallel(vec![send(0), inner])));
        assert_eq!(store.bucket(Slot::free(Kind::Send)).len(), 1);
        assert_eq!(store.bucket(Slot::free(Kind::Receive)).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replication_is_unwrapped_and_deduplicated() {
        let mut store = Store::default();
        let body = Arc::new(Process::parallel(vec![send(0), Arc::new(Process::Replication(receive(1)))]));
        let replicated = Arc::new(Process::Replication(body));
        store.integrate(Arc::clone(&replicated));
        store.integrate(replicated);
        assert_eq!(store.bucket(Slot::replicated(Kind::Send)).len(), 1);
        assert_eq!(store.bucket(Slot::replicated(Kind::Receive)).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn free_copies_are_distinct_members() {
        let mut store = Store::default();
        let process = send(0);
        store.integrate(Arc::clone(&process));
        store.integrate(process);
        let ids: Vec<_> = store.bucket(Slot::free(Kind::Send)).iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn removing_a_non_member_fails() {
        let mut store = Store::default();
        store.integrate(send(0));
        let id = store.bucket(Slot::free(Kind::Send))[0].id;
        assert!(store.remove(Slot::free(Kind::Receive), id).is_err());
        assert!(store.remove(Slot::free(Kind::Send), id).is_ok());
        assert_eq!(
            store.remove(Slot::free(Kind::Send), id).unwrap_err(),
            EngineError::NotLive(Slot::free(Kind::Send))
        );
        assert!(store.is_empty());
    }
}

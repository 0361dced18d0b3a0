//! The execution model: a frozen view of one candidate execution extracted
//! from a satisfying assignment. Events, program order, read-from edges and
//! the caller-supplied coherence hints are fixed here; only coherence remains
//! to be completed by the search.

use std::fmt::Display;

use fnv::FnvHashMap;
use fnv::FnvHashSet;
use thiserror::Error;

/// Stable identity of a program event. Ids are dense, minted by the
/// [`ExecutionModelBuilder`], and give a deterministic ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u32);

impl EventId {
    pub(crate) fn new(raw: u32) -> EventId {
        EventId(raw)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity of a program thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u32);

impl Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Opaque grouping key for memory locations. The engine only ever compares
/// addresses for equality and uses them to group writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    pub fn new(raw: u64) -> Address {
        Address(raw)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The write that establishes a location's value before any thread runs.
    InitialWrite,
    Write,
    Read,
}

impl EventKind {
    pub fn is_write(self) -> bool {
        matches!(self, EventKind::InitialWrite | EventKind::Write)
    }

    pub fn is_init(self) -> bool {
        matches!(self, EventKind::InitialWrite)
    }
}

/// A program event together with the metadata the search cares about: its
/// kind, its location, and an importance weight (the number of read-from
/// edges touching it) used to order coherence candidates.
#[derive(Clone, Copy, Debug)]
pub struct EventData {
    pub id: EventId,
    /// `None` for initial writes, which precede all threads.
    pub thread: Option<ThreadId>,
    pub kind: EventKind,
    pub address: Address,
    pub importance: u32,
}

/// A directed pair of events, representing a candidate member of a relation.
///
/// The timestamp at which an edge was inserted is tracked by the owning
/// relation graph, not here: edges compare equal regardless of when they
/// were added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub first: EventId,
    pub second: EventId,
}

impl Edge {
    pub fn new(first: EventId, second: EventId) -> Edge {
        Edge { first, second }
    }

    #[must_use]
    pub fn inverse(self) -> Edge {
        Edge {
            first: self.second,
            second: self.first,
        }
    }

    pub fn is_loop(self) -> bool {
        self.first == self.second
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Malformed input from the upstream collaborator. These indicate a bug in
/// the caller, not a recoverable condition; past the ingestion boundary such
/// states are guarded by assertions instead.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("thread {0} does not exist in the model")]
    UnknownThread(ThreadId),
    #[error("read-from source {0} is not a write")]
    ReadFromSourceNotWrite(EventId),
    #[error("read-from target {0} is not a read")]
    ReadFromTargetNotRead(EventId),
    #[error("read-from edge ({0}, {1}) connects events at different addresses")]
    ReadFromAddressMismatch(EventId, EventId),
    #[error("read {0} already has a read-from source")]
    DuplicateReadFrom(EventId),
    #[error("address {0} already has an initial write")]
    DuplicateInitialWrite(Address),
    #[error("coherence hint ({0}, {1}) does not relate two distinct writes to one address")]
    MalformedCoherenceHint(EventId, EventId),
    #[error("coherence hint ({0}, {1}) contradicts an earlier hint")]
    ContradictoryCoherenceHint(EventId, EventId),
}

/// Builds up an [`ExecutionModel`] event by event.
#[derive(Debug, Default)]
pub struct ExecutionModelBuilder {
    events: Vec<EventData>,
    threads: Vec<Vec<EventId>>,
    read_from: Vec<Edge>,
    rf_source: FnvHashMap<EventId, EventId>,
    init_writes: FnvHashMap<Address, EventId>,
    forbidden: FnvHashSet<Edge>,
    required: FnvHashSet<Edge>,
}

impl ExecutionModelBuilder {
    pub fn new_thread(&mut self) -> ThreadId {
        let id = ThreadId(self.threads.len() as u32);
        self.threads.push(Vec::new());
        id
    }

    /// Add the initial write for `address`. At most one may exist per
    /// address.
    pub fn add_init(&mut self, address: Address) -> Result<EventId, ModelError> {
        if self.init_writes.contains_key(&address) {
            return Err(ModelError::DuplicateInitialWrite(address));
        }
        let id = self.new_event(None, EventKind::InitialWrite, address);
        let _ = self.init_writes.insert(address, id);
        Ok(id)
    }

    pub fn add_write(&mut self, thread: ThreadId, address: Address) -> Result<EventId, ModelError> {
        self.check_thread(thread)?;
        Ok(self.new_event(Some(thread), EventKind::Write, address))
    }

    pub fn add_read(&mut self, thread: ThreadId, address: Address) -> Result<EventId, ModelError> {
        self.check_thread(thread)?;
        Ok(self.new_event(Some(thread), EventKind::Read, address))
    }

    /// Record that `read` observes the value stored by `write`.
    pub fn add_read_from(&mut self, write: EventId, read: EventId) -> Result<(), ModelError> {
        if !self.events[write.index()].kind.is_write() {
            return Err(ModelError::ReadFromSourceNotWrite(write));
        }
        if self.events[read.index()].kind != EventKind::Read {
            return Err(ModelError::ReadFromTargetNotRead(read));
        }
        if self.events[write.index()].address != self.events[read.index()].address {
            return Err(ModelError::ReadFromAddressMismatch(write, read));
        }
        if self.rf_source.contains_key(&read) {
            return Err(ModelError::DuplicateReadFrom(read));
        }
        let _ = self.rf_source.insert(read, write);
        self.read_from.push(Edge::new(write, read));
        Ok(())
    }

    /// Declare that no execution can order `first` coherence-before `second`
    /// (the upstream analysis' maximal possible-edge set lacks the pair).
    pub fn forbid_coherence(&mut self, first: EventId, second: EventId) -> Result<(), ModelError> {
        let edge = self.check_hint(first, second)?;
        if self.required.contains(&edge) || self.forbidden.contains(&edge.inverse()) {
            return Err(ModelError::ContradictoryCoherenceHint(first, second));
        }
        let _ = self.forbidden.insert(edge);
        Ok(())
    }

    /// Declare that every execution orders `first` coherence-before `second`
    /// (the upstream analysis' minimal required-edge set contains the pair).
    pub fn require_coherence(&mut self, first: EventId, second: EventId) -> Result<(), ModelError> {
        let edge = self.check_hint(first, second)?;
        if self.forbidden.contains(&edge) || self.required.contains(&edge.inverse()) {
            return Err(ModelError::ContradictoryCoherenceHint(first, second));
        }
        let _ = self.required.insert(edge);
        Ok(())
    }

    pub fn build(self) -> ExecutionModel {
        let mut events = self.events;

        for rf in &self.read_from {
            events[rf.first.index()].importance += 1;
            events[rf.second.index()].importance += 1;
        }

        let mut writes_by_address: FnvHashMap<Address, Vec<EventId>> = FnvHashMap::default();
        for event in &events {
            if event.kind.is_write() {
                writes_by_address
                    .entry(event.address)
                    .or_default()
                    .push(event.id);
            }
        }
        // Deterministic iteration order for the search-list construction.
        let mut address_writes: Vec<(Address, Vec<EventId>)> =
            writes_by_address.into_iter().collect();
        address_writes.sort_by_key(|(address, _)| *address);

        ExecutionModel {
            events,
            threads: self.threads,
            read_from: self.read_from,
            address_writes,
            forbidden: self.forbidden,
            required: self.required,
        }
    }

    fn new_event(&mut self, thread: Option<ThreadId>, kind: EventKind, address: Address) -> EventId {
        let id = EventId(self.events.len() as u32);
        self.events.push(EventData {
            id,
            thread,
            kind,
            address,
            importance: 0,
        });
        if let Some(thread) = thread {
            self.threads[thread.0 as usize].push(id);
        }
        id
    }

    fn check_thread(&self, thread: ThreadId) -> Result<(), ModelError> {
        if (thread.0 as usize) < self.threads.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownThread(thread))
        }
    }

    fn check_hint(&self, first: EventId, second: EventId) -> Result<Edge, ModelError> {
        let malformed = first == second
            || !self.events[first.index()].kind.is_write()
            || !self.events[second.index()].kind.is_write()
            || self.events[first.index()].address != self.events[second.index()].address;
        if malformed {
            return Err(ModelError::MalformedCoherenceHint(first, second));
        }
        Ok(Edge::new(first, second))
    }
}

/// A frozen candidate execution. Created once per verification attempt and
/// immutable thereafter.
#[derive(Debug)]
pub struct ExecutionModel {
    events: Vec<EventData>,
    threads: Vec<Vec<EventId>>,
    read_from: Vec<Edge>,
    address_writes: Vec<(Address, Vec<EventId>)>,
    forbidden: FnvHashSet<Edge>,
    required: FnvHashSet<Edge>,
}

impl ExecutionModel {
    pub fn builder() -> ExecutionModelBuilder {
        ExecutionModelBuilder::default()
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[EventData] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> &EventData {
        &self.events[id.index()]
    }

    pub fn is_init(&self, id: EventId) -> bool {
        self.event(id).kind.is_init()
    }

    pub(crate) fn threads(&self) -> &[Vec<EventId>] {
        &self.threads
    }

    pub(crate) fn read_from(&self) -> &[Edge] {
        &self.read_from
    }

    /// Writes grouped per address, in deterministic (address, id) order.
    pub(crate) fn address_writes(&self) -> &[(Address, Vec<EventId>)] {
        &self.address_writes
    }

    /// Whether coherence may order `edge.first` before `edge.second` in some
    /// execution. Everything is possible unless the caller said otherwise.
    pub(crate) fn coherence_possible(&self, edge: Edge) -> bool {
        !self.forbidden.contains(&edge)
    }

    /// Whether coherence must order `edge.first` before `edge.second` in all
    /// executions.
    pub(crate) fn coherence_required(&self, edge: Edge) -> bool {
        self.required.contains(&edge)
    }
}

#[cfg(test)]
mod tests {
    use super::Address;
    use super::ExecutionModel;
    use super::ModelError;

    #[test]
    fn rejects_duplicate_initial_write() {
        let mut builder = ExecutionModel::builder();
        let _ = builder.add_init(Address::new(0)).unwrap();
        assert!(matches!(
            builder.add_init(Address::new(0)),
            Err(ModelError::DuplicateInitialWrite(_))
        ));
    }

    #[test]
    fn rejects_mismatched_read_from() {
        let mut builder = ExecutionModel::builder();
        let thread = builder.new_thread();
        let write = builder.add_write(thread, Address::new(0)).unwrap();
        let read = builder.add_read(thread, Address::new(1)).unwrap();
        assert!(matches!(
            builder.add_read_from(write, read),
            Err(ModelError::ReadFromAddressMismatch(_, _))
        ));
    }

    #[test]
    fn rejects_second_read_from_source() {
        let mut builder = ExecutionModel::builder();
        let thread = builder.new_thread();
        let address = Address::new(0);
        let w1 = builder.add_write(thread, address).unwrap();
        let w2 = builder.add_write(thread, address).unwrap();
        let read = builder.add_read(thread, address).unwrap();
        builder.add_read_from(w1, read).unwrap();
        assert!(matches!(
            builder.add_read_from(w2, read),
            Err(ModelError::DuplicateReadFrom(_))
        ));
    }

    #[test]
    fn rejects_contradictory_coherence_hints() {
        let mut builder = ExecutionModel::builder();
        let thread = builder.new_thread();
        let address = Address::new(0);
        let w1 = builder.add_write(thread, address).unwrap();
        let w2 = builder.add_write(thread, address).unwrap();
        builder.require_coherence(w1, w2).unwrap();
        assert!(matches!(
            builder.forbid_coherence(w1, w2),
            Err(ModelError::ContradictoryCoherenceHint(_, _))
        ));
        assert!(matches!(
            builder.require_coherence(w2, w1),
            Err(ModelError::ContradictoryCoherenceHint(_, _))
        ));
    }

    #[test]
    fn importance_counts_read_from_degree() {
        let mut builder = ExecutionModel::builder();
        let thread = builder.new_thread();
        let address = Address::new(0);
        let write = builder.add_write(thread, address).unwrap();
        let r1 = builder.add_read(thread, address).unwrap();
        let r2 = builder.add_read(thread, address).unwrap();
        builder.add_read_from(write, r1).unwrap();
        builder.add_read_from(write, r2).unwrap();

        let model = builder.build();
        assert_eq!(model.event(write).importance, 2);
        assert_eq!(model.event(r1).importance, 1);
    }
}

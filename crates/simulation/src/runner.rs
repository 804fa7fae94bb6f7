//! Simulation runner.

use crate::{EventKey, NetworkConfig, SimCustody, SimEvent, SimulatedNetwork};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use xstake_core::{
    decode_message, encode_message, Action, CodecError, Command, CommandOutcome,
    CrossDomainMessage, Event, Fact, ProtocolError, RequestId, StateMachine,
};
use xstake_node::{DomainConfig, DomainStateMachine};
use xstake_types::{Address, DomainId};

/// A fact emitted during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFact {
    pub time: Duration,
    pub domain: DomainId,
    pub fact: Fact,
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Events handed to a domain.
    pub events_processed: u64,
    /// Commands handled.
    pub commands: u64,
    /// Commands answered with an error.
    pub commands_rejected: u64,
    /// Messages handed to the network.
    pub messages_sent: u64,
    /// Messages decoded and handed to a domain.
    pub messages_delivered: u64,
    /// Messages lost to drops or partitions.
    pub messages_dropped: u64,
    /// Extra copies scheduled by the network.
    pub messages_duplicated: u64,
    /// Deliveries that failed to decode.
    pub decode_failures: u64,
    /// Settlements refused by custody.
    pub settlement_failures: u64,
}

/// Deterministic multi-domain simulation runner.
///
/// Domains run in-process; cross-domain messages are encoded, delayed by
/// the simulated network and decoded on arrival.
pub struct SimulationRunner {
    domains: BTreeMap<DomainId, DomainStateMachine<SimCustody>>,
    queue: BTreeMap<EventKey, SimEvent>,
    sequence: u64,
    now: Duration,
    rng: ChaCha8Rng,
    network: SimulatedNetwork,
    next_request: u64,
    results: BTreeMap<RequestId, Result<CommandOutcome, ProtocolError>>,
    facts: Vec<RecordedFact>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with no domains.
    pub fn new(network: NetworkConfig, seed: u64) -> Self {
        Self {
            domains: BTreeMap::new(),
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
            network: SimulatedNetwork::new(network),
            next_request: 0,
            results: BTreeMap::new(),
            facts: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    /// Add a domain with empty custody, replacing any domain with the same id.
    pub fn add_domain(&mut self, config: DomainConfig) {
        let id = config.domain;
        let mut domain = DomainStateMachine::new(config, SimCustody::new());
        domain.set_time(self.now);
        if self.domains.insert(id, domain).is_some() {
            warn!(domain = %id, "Replaced existing domain");
        }
        debug!(domain = %id, "Domain added");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn domain(&self, id: DomainId) -> Option<&DomainStateMachine<SimCustody>> {
        self.domains.get(&id)
    }

    pub fn domain_mut(&mut self, id: DomainId) -> Option<&mut DomainStateMachine<SimCustody>> {
        self.domains.get_mut(&id)
    }

    /// Custody of a domain, for genesis funding.
    pub fn custody_mut(&mut self, id: DomainId) -> Option<&mut SimCustody> {
        self.domains.get_mut(&id).map(|d| d.custody_mut())
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Mutable network, for partitions.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Result of a submitted command, once it has been handled.
    pub fn result(&self, request: RequestId) -> Option<&Result<CommandOutcome, ProtocolError>> {
        self.results.get(&request)
    }

    /// Every fact emitted so far, in emission order.
    pub fn facts(&self) -> &[RecordedFact] {
        &self.facts
    }

    /// Facts emitted by one domain.
    pub fn facts_for(&self, domain: DomainId) -> impl Iterator<Item = &Fact> {
        self.facts
            .iter()
            .filter(move |f| f.domain == domain)
            .map(|f| &f.fact)
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scheduling
    // ═══════════════════════════════════════════════════════════════════════

    /// Submit a command to run at the current time.
    pub fn submit(&mut self, domain: DomainId, caller: Address, command: Command) -> RequestId {
        self.submit_at(self.now, domain, caller, command)
    }

    /// Submit a command to run at `time`.
    pub fn submit_at(
        &mut self,
        time: Duration,
        domain: DomainId,
        caller: Address,
        command: Command,
    ) -> RequestId {
        let request_id = RequestId::new(self.next_request);
        self.next_request += 1;
        self.schedule(
            time.max(self.now),
            domain,
            SimEvent::Command {
                request_id,
                caller,
                command,
            },
        );
        request_id
    }

    /// Deliver a message at the current time, bypassing the network.
    ///
    /// Models a transport replaying a message it already delivered.
    pub fn inject(
        &mut self,
        from: DomainId,
        to: DomainId,
        message: &CrossDomainMessage,
    ) -> Result<(), CodecError> {
        let payload = encode_message(message)?;
        self.schedule(
            self.now,
            to,
            SimEvent::Delivery {
                from,
                type_id: message.type_name(),
                payload,
            },
        );
        Ok(())
    }

    fn schedule(&mut self, time: Duration, domain: DomainId, event: SimEvent) {
        let key = EventKey {
            time,
            priority: event.priority(),
            domain,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.queue.insert(key, event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════════════

    /// Process the next event. Returns false if the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some((key, event)) = self.queue.pop_first() else {
            return false;
        };
        self.now = self.now.max(key.time);

        let Some(domain) = self.domains.get_mut(&key.domain) else {
            warn!(domain = %key.domain, "Event for unknown domain dropped");
            return true;
        };
        domain.set_time(key.time);

        let event = match event {
            SimEvent::Command {
                request_id,
                caller,
                command,
            } => {
                self.stats.commands += 1;
                Event::Command {
                    request_id,
                    caller,
                    command,
                }
            }
            SimEvent::Delivery {
                from,
                type_id,
                payload,
            } => match decode_message(type_id, &payload) {
                Ok(message) => {
                    self.stats.messages_delivered += 1;
                    Event::MessageReceived { from, message }
                }
                Err(e) => {
                    warn!(from = %from, to = %key.domain, type_id, error = %e, "Undecodable delivery");
                    self.stats.decode_failures += 1;
                    return true;
                }
            },
        };

        trace!(domain = %key.domain, time = ?key.time, event = event.type_name(), "Processing event");
        let actions = domain.handle(event);
        self.stats.events_processed += 1;
        self.process_actions(key.domain, key.time, actions);
        true
    }

    /// Process every event scheduled at or before `end`, then advance the
    /// clock to `end`.
    pub fn run_until(&mut self, end: Duration) {
        while self
            .queue
            .first_key_value()
            .is_some_and(|(key, _)| key.time <= end)
        {
            self.step();
        }
        self.now = self.now.max(end);
        for domain in self.domains.values_mut() {
            domain.set_time(self.now);
        }
    }

    /// Advance the clock by `duration`, processing everything due.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    fn process_actions(&mut self, source: DomainId, time: Duration, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SendMessage {
                    destination,
                    message,
                } => self.send(source, destination, time, &message),
                Action::EmitCommandResult { request_id, result } => {
                    if result.is_err() {
                        self.stats.commands_rejected += 1;
                    }
                    self.results.insert(request_id, result);
                }
                Action::EmitFact(fact) => {
                    if matches!(fact, Fact::SettlementFailed { .. }) {
                        self.stats.settlement_failures += 1;
                    }
                    self.facts.push(RecordedFact {
                        time,
                        domain: source,
                        fact,
                    });
                }
            }
        }
    }

    fn send(
        &mut self,
        from: DomainId,
        to: DomainId,
        time: Duration,
        message: &CrossDomainMessage,
    ) {
        if !self.domains.contains_key(&to) {
            warn!(from = %from, to = %to, message = message.type_name(), "No route to domain");
            self.stats.messages_dropped += 1;
            return;
        }
        let payload = match encode_message(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(from = %from, to = %to, error = %e, "Failed to encode message");
                return;
            }
        };
        self.stats.messages_sent += 1;

        let delays = self.network.sample_deliveries(from, to, &mut self.rng);
        match delays.len() {
            0 => {
                debug!(from = %from, to = %to, message = message.type_name(), "Message lost");
                self.stats.messages_dropped += 1;
            }
            n => self.stats.messages_duplicated += n as u64 - 1,
        }

        for delay in delays {
            self.schedule(
                time + delay,
                to,
                SimEvent::Delivery {
                    from,
                    type_id: message.type_name(),
                    payload: payload.clone(),
                },
            );
        }
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("now", &self.now)
            .field("domains", &self.domains.keys().collect::<Vec<_>>())
            .field("pending_events", &self.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}

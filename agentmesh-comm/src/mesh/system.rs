//! Agent system: spawn/stop lifecycle wiring router, gossip, and
//! mailboxes together.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

// Layer 3: Internal module imports
use super::agent::{AgentBehavior, AgentContext};
use super::config::SystemConfig;
use super::error::{MeshError, SystemError};
use super::gossip::GossipProtocol;
use super::router::{AskOptions, Router};
use crate::mailbox::{PriorityMailbox, PriorityMailboxSender};
use crate::message::{Envelope, MessageKind};
use crate::util::AgentAddress;

/// System lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemState {
    Running,
    ShuttingDown,
    Stopped,
}

struct AgentHandle {
    mailbox_sender: PriorityMailboxSender,
    task: JoinHandle<()>,
    #[allow(dead_code)] // Introspection surface for embedding frontends
    spawned_at: DateTime<Utc>,
}

struct AgentSystemInner {
    config: SystemConfig,
    router: Router,
    gossip: GossipProtocol,
    agents: RwLock<HashMap<AgentAddress, AgentHandle>>,
    state: RwLock<SystemState>,
}

/// Owner of the mesh: spawns agents, wires their mailboxes into the
/// router, registers them with gossip membership, and tears everything
/// down on shutdown.
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones manage the same mesh.
///
/// # Example
/// ```rust,ignore
/// let system = AgentSystem::new(SystemConfig::default());
/// let worker = system
///     .spawn()
///     .with_expertise(["rust"])
///     .start(AgentAddress::new("worker"), MyBehavior::default())?;
///
/// worker.tell(AgentAddress::new("other"), json!("hello"))?;
/// system.shutdown().await?;
/// ```
#[derive(Clone)]
pub struct AgentSystem {
    inner: Arc<AgentSystemInner>,
}

impl AgentSystem {
    /// Create a system and start the gossip sweep timer.
    pub fn new(config: SystemConfig) -> Self {
        let gossip = GossipProtocol::new(config.gossip.clone());
        gossip.start();
        Self {
            inner: Arc::new(AgentSystemInner {
                config,
                router: Router::new(),
                gossip,
                agents: RwLock::new(HashMap::new()),
                state: RwLock::new(SystemState::Running),
            }),
        }
    }

    /// System configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// The mesh router.
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// The gossip membership protocol.
    pub fn gossip(&self) -> &GossipProtocol {
        &self.inner.gossip
    }

    /// Number of live agents.
    pub fn agent_count(&self) -> usize {
        self.inner.agents.read().len()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.state.read() != SystemState::Running
    }

    /// Begin configuring a new agent.
    pub fn spawn(&self) -> SpawnBuilder {
        SpawnBuilder::new(self.clone())
    }

    /// Spawn an agent with default options.
    pub fn spawn_agent<B: AgentBehavior>(
        &self,
        address: AgentAddress,
        behavior: B,
    ) -> Result<AgentRef, SystemError> {
        self.spawn().start(address, behavior)
    }

    /// Handle for a live agent, if present.
    pub fn agent_ref(&self, address: &AgentAddress) -> Option<AgentRef> {
        self.inner.agents.read().get(address).map(|_| AgentRef {
            address: address.clone(),
            router: self.inner.router.clone(),
        })
    }

    fn register_agent(
        &self,
        address: AgentAddress,
        handle: AgentHandle,
    ) -> Result<(), SystemError> {
        let mut agents = self.inner.agents.write();
        if agents.contains_key(&address) {
            return Err(SystemError::AddressInUse(address));
        }
        agents.insert(address, handle);
        Ok(())
    }

    /// Gracefully stop an agent: no new deliveries, queued envelopes
    /// drain, then the task exits.
    pub async fn stop(&self, address: &AgentAddress) -> Result<(), SystemError> {
        let handle = self
            .inner
            .agents
            .write()
            .remove(address)
            .ok_or_else(|| SystemError::AgentNotFound(address.clone()))?;

        self.inner.router.remove_actor(address);
        self.inner.gossip.unregister(address);
        handle.mailbox_sender.close();

        let deadline = Instant::now() + self.inner.config.shutdown_timeout;
        let mut task = handle.task;
        if timeout_at(deadline, &mut task).await.is_err() {
            task.abort();
            return Err(SystemError::ShutdownTimeout(
                self.inner.config.shutdown_timeout,
            ));
        }
        Ok(())
    }

    /// Kill an agent: the in-flight behavior is dropped at its next
    /// suspension point and queued envelopes are discarded unprocessed.
    pub fn kill(&self, address: &AgentAddress) -> Result<(), SystemError> {
        let handle = self
            .inner
            .agents
            .write()
            .remove(address)
            .ok_or_else(|| SystemError::AgentNotFound(address.clone()))?;

        self.inner.router.remove_actor(address);
        self.inner.gossip.unregister(address);
        handle.task.abort();
        handle.mailbox_sender.close();
        Ok(())
    }

    /// Shut the whole system down: stop gossip, close every mailbox,
    /// reject outstanding asks, and wait for agent tasks within the
    /// configured timeout (stragglers are aborted).
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        {
            let mut state = self.inner.state.write();
            if *state != SystemState::Running {
                return Err(SystemError::ShuttingDown);
            }
            *state = SystemState::ShuttingDown;
        }

        self.inner.gossip.destroy();

        let handles: Vec<(AgentAddress, AgentHandle)> =
            self.inner.agents.write().drain().collect();
        for (address, handle) in &handles {
            self.inner.router.remove_actor(address);
            handle.mailbox_sender.close();
        }

        // Rejecting outstanding asks lets draining behaviors that are
        // suspended on them finish promptly.
        self.inner.router.destroy();

        let deadline = Instant::now() + self.inner.config.shutdown_timeout;
        let mut timed_out = false;
        for (_, handle) in handles {
            let mut task = handle.task;
            if timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                timed_out = true;
            }
        }

        *self.inner.state.write() = SystemState::Stopped;
        if timed_out {
            Err(SystemError::ShutdownTimeout(
                self.inner.config.shutdown_timeout,
            ))
        } else {
            Ok(())
        }
    }
}

/// Fluent builder for spawning agents.
///
/// # Example
/// ```rust,ignore
/// let agent = system
///     .spawn()
///     .with_mailbox_capacity(64)
///     .with_expertise(["rust", "review"])
///     .with_topics(["announcements"])
///     .start(AgentAddress::new("reviewer"), ReviewerBehavior::new())?;
/// ```
pub struct SpawnBuilder {
    system: AgentSystem,
    mailbox_capacity: Option<usize>,
    expertise: Vec<String>,
    capabilities: Vec<String>,
    topics: Vec<String>,
}

impl SpawnBuilder {
    fn new(system: AgentSystem) -> Self {
        Self {
            system,
            mailbox_capacity: None,
            expertise: Vec::new(),
            capabilities: Vec::new(),
            topics: Vec::new(),
        }
    }

    /// Override the mailbox capacity for this agent.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = Some(capacity);
        self
    }

    /// Advertise expertise tags in the gossip view.
    pub fn with_expertise<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Advertise capabilities in the gossip view.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Subscribe the agent to broadcast topics at spawn time.
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Spawn the agent and return its handle.
    pub fn start<B: AgentBehavior>(
        self,
        address: AgentAddress,
        behavior: B,
    ) -> Result<AgentRef, SystemError> {
        if self.system.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        let capacity = self
            .mailbox_capacity
            .unwrap_or(self.system.inner.config.default_mailbox_capacity);
        let (mailbox, mailbox_sender) = PriorityMailbox::new(capacity);

        let router = self.system.inner.router.clone();
        if !router.add_actor(address.clone(), mailbox_sender.clone()) {
            return Err(SystemError::AddressInUse(address));
        }
        for topic in &self.topics {
            router.subscribe(&address, topic.clone());
        }
        self.system
            .inner
            .gossip
            .register(address.clone(), self.expertise, self.capabilities);

        let task = tokio::spawn(agent_loop(
            address.clone(),
            behavior,
            mailbox,
            router.clone(),
        ));

        let handle = AgentHandle {
            mailbox_sender,
            task,
            spawned_at: Utc::now(),
        };
        if let Err(error) = self.system.register_agent(address.clone(), handle) {
            router.remove_actor(&address);
            self.system.inner.gossip.unregister(&address);
            return Err(error);
        }

        Ok(AgentRef { address, router })
    }
}

/// Handle to a live agent.
///
/// The handle stays valid for addressing even after the agent stops;
/// sends to a stopped agent surface as `undeliverable` router events.
#[derive(Clone)]
pub struct AgentRef {
    address: AgentAddress,
    router: Router,
}

impl AgentRef {
    /// The agent's address.
    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    /// Fire-and-forget send from this agent.
    pub fn tell(&self, to: AgentAddress, payload: Value) -> Result<(), MeshError> {
        self.router
            .tell(self.address.clone(), to, payload, AskOptions::default())
    }

    /// Fire-and-forget send with explicit options.
    pub fn tell_with(
        &self,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<(), MeshError> {
        self.router.tell(self.address.clone(), to, payload, options)
    }

    /// Ask another agent and await the correlated reply.
    pub async fn ask(
        &self,
        to: AgentAddress,
        payload: Value,
        options: AskOptions,
    ) -> Result<Envelope, MeshError> {
        self.router
            .ask(self.address.clone(), to, payload, options)
            .await
    }
}

async fn agent_loop<B: AgentBehavior>(
    address: AgentAddress,
    mut behavior: B,
    mut mailbox: PriorityMailbox,
    router: Router,
) {
    while let Some(envelope) = mailbox.recv().await {
        let mut context = AgentContext::new(address.clone(), envelope.clone(), router.clone());
        if let Err(error) = behavior.on_envelope(envelope.clone(), &mut context).await {
            router.emit_behavior_error(&address, error.to_string());
            if envelope.kind == MessageKind::Ask {
                router.route(Envelope::error_reply_to(
                    &envelope,
                    address.clone(),
                    json!({ "error": error.to_string() }),
                ));
            }
        }
    }
}

//! SWIM-inspired membership and failure detection.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// Layer 3: Internal module imports
use super::config::GossipConfig;
use super::peer::{PeerStatus, PeerView};
use crate::monitoring::{GossipEvent, GossipEventKind, Observers};
use crate::util::{AgentAddress, ObserverId};

struct GossipInner {
    config: GossipConfig,
    peers: RwLock<HashMap<AgentAddress, PeerView>>,
    observers: Observers<GossipEvent>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

/// Peer membership table with suspicion-based failure detection.
///
/// Peers move `alive -> suspect -> dead` as sweeps observe growing
/// silence; each transition bumps the peer's generation. Merging adopts a
/// remote view only when its generation is strictly greater, so stale
/// gossip can never resurrect a fresher local observation.
///
/// # Clone Semantics
///
/// Cheap clone via `Arc`; all clones share the same peer table.
#[derive(Clone)]
pub struct GossipProtocol {
    inner: Arc<GossipInner>,
}

impl GossipProtocol {
    /// Create a protocol instance with the given configuration.
    pub fn new(config: GossipConfig) -> Self {
        Self {
            inner: Arc::new(GossipInner {
                config,
                peers: RwLock::new(HashMap::new()),
                observers: Observers::new(),
                sweep_task: Mutex::new(None),
            }),
        }
    }

    /// Gossip configuration.
    pub fn config(&self) -> &GossipConfig {
        &self.inner.config
    }

    /// Register an observer for gossip events.
    pub fn observe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&GossipEvent) + Send + Sync + 'static,
    {
        self.inner.observers.observe(callback)
    }

    /// Remove an observer. Idempotent.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.observers.unobserve(id)
    }

    /// Insert or refresh the local view of a peer as alive, bumping its
    /// generation past any prior observation.
    pub fn register(
        &self,
        id: AgentAddress,
        expertise: Vec<String>,
        capabilities: Vec<String>,
    ) -> PeerView {
        let (view, discovered) = {
            let mut peers = self.inner.peers.write();
            let generation = peers.get(&id).map_or(1, |view| view.generation + 1);
            let discovered = !peers.contains_key(&id);
            let view = PeerView::alive(id.clone(), expertise, capabilities, generation);
            peers.insert(id, view.clone());
            (view, discovered)
        };

        if discovered {
            self.inner
                .observers
                .notify(&GossipEvent::now(GossipEventKind::PeerDiscovered {
                    peer: view.id.clone(),
                }));
        }
        view
    }

    /// Record a heartbeat from a peer, refreshing its `last_seen`.
    /// Returns whether the peer is known.
    pub fn heartbeat(&self, id: &AgentAddress) -> bool {
        let mut peers = self.inner.peers.write();
        match peers.get_mut(id) {
            Some(view) => {
                view.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a peer from the table. Returns whether it was present.
    pub fn unregister(&self, id: &AgentAddress) -> bool {
        self.inner.peers.write().remove(id).is_some()
    }

    /// Merge remote views. Unknown peers are inserted; known peers are
    /// replaced iff the remote generation is strictly greater. Returns
    /// the views that changed locally.
    pub fn merge(&self, remote_views: Vec<PeerView>) -> Vec<PeerView> {
        let mut changed = Vec::new();
        let mut discovered = Vec::new();
        {
            let mut peers = self.inner.peers.write();
            for remote in remote_views {
                match peers.get(&remote.id) {
                    None => {
                        discovered.push(remote.id.clone());
                        peers.insert(remote.id.clone(), remote.clone());
                        changed.push(remote);
                    }
                    Some(local) if remote.generation > local.generation => {
                        peers.insert(remote.id.clone(), remote.clone());
                        changed.push(remote);
                    }
                    Some(_) => {}
                }
            }
        }

        for peer in discovered {
            self.inner
                .observers
                .notify(&GossipEvent::now(GossipEventKind::PeerDiscovered { peer }));
        }
        changed
    }

    /// Snapshot of every known view, for transmission.
    pub fn get_view(&self) -> Vec<PeerView> {
        self.inner.peers.read().values().cloned().collect()
    }

    /// Look up one peer's view.
    pub fn get_peer(&self, id: &AgentAddress) -> Option<PeerView> {
        self.inner.peers.read().get(id).cloned()
    }

    /// Number of known peers.
    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().len()
    }

    /// Select up to `fanout` alive peers uniformly at random, excluding
    /// the given addresses.
    pub fn select_targets(&self, exclude: &[AgentAddress]) -> Vec<PeerView> {
        let mut candidates: Vec<PeerView> = {
            let peers = self.inner.peers.read();
            peers
                .values()
                .filter(|view| view.status == PeerStatus::Alive)
                .filter(|view| !exclude.contains(&view.id))
                .cloned()
                .collect()
        };

        let fanout = self.inner.config.fanout.min(candidates.len());
        let mut rng = rand::thread_rng();
        let (selected, _) = candidates.partial_shuffle(&mut rng, fanout);
        selected.to_vec()
    }

    /// All alive peers advertising an expertise tag.
    pub fn find_by_expertise(&self, tag: &str) -> Vec<PeerView> {
        self.inner
            .peers
            .read()
            .values()
            .filter(|view| view.status == PeerStatus::Alive && view.has_expertise(tag))
            .cloned()
            .collect()
    }

    /// Run one failure-detection pass over the table.
    ///
    /// A peer silent longer than the suspect threshold moves
    /// `alive -> suspect`; one silent longer than the dead threshold moves
    /// `suspect -> dead`. Each transition bumps the generation and emits
    /// an event.
    pub fn sweep(&self) {
        let now = Utc::now();
        let suspect_ms = self.inner.config.suspect_timeout.as_millis() as i64;
        let dead_ms = self.inner.config.dead_timeout.as_millis() as i64;

        let mut events = Vec::new();
        {
            let mut peers = self.inner.peers.write();
            for view in peers.values_mut() {
                let silence_ms = now.signed_duration_since(view.last_seen).num_milliseconds();
                match view.status {
                    PeerStatus::Alive if silence_ms > suspect_ms => {
                        view.status = PeerStatus::Suspect;
                        view.generation += 1;
                        events.push(GossipEventKind::PeerSuspect {
                            peer: view.id.clone(),
                            generation: view.generation,
                        });
                    }
                    PeerStatus::Suspect if silence_ms > dead_ms => {
                        view.status = PeerStatus::Dead;
                        view.generation += 1;
                        events.push(GossipEventKind::PeerDead {
                            peer: view.id.clone(),
                            generation: view.generation,
                        });
                    }
                    _ => {}
                }
            }
        }

        for kind in events {
            self.inner.observers.notify(&GossipEvent::now(kind));
        }
    }

    /// Schedule periodic sweeps. Idempotent: any previously scheduled
    /// timer is cancelled before the new one is installed.
    pub fn start(&self) {
        let protocol = self.clone();
        let interval = self.inner.config.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                protocol.sweep();
            }
        });

        let mut guard = self.inner.sweep_task.lock();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(handle);
    }

    /// Cancel the periodic sweep timer, if scheduled.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.sweep_task.lock().take() {
            handle.abort();
        }
    }

    /// Cancel the timer and drop every observer registration.
    pub fn destroy(&self) {
        self.stop();
        self.inner.observers.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(name: &str) -> AgentAddress {
        AgentAddress::new(name)
    }

    fn protocol() -> GossipProtocol {
        GossipProtocol::new(GossipConfig::default())
    }

    fn backdate(protocol: &GossipProtocol, id: &AgentAddress, ms: i64) {
        let mut peers = protocol.inner.peers.write();
        let view = peers.get_mut(id).unwrap();
        view.last_seen = Utc::now() - ChronoDuration::milliseconds(ms);
    }

    #[test]
    fn test_register_starts_alive_generation_one() {
        let gossip = protocol();
        let view = gossip.register(addr("p"), vec!["rust".to_string()], vec![]);

        assert_eq!(view.status, PeerStatus::Alive);
        assert_eq!(view.generation, 1);
        assert_eq!(gossip.peer_count(), 1);
    }

    #[test]
    fn test_reregister_bumps_generation() {
        let gossip = protocol();
        gossip.register(addr("p"), vec![], vec![]);
        let second = gossip.register(addr("p"), vec![], vec![]);

        assert_eq!(second.generation, 2);
    }

    #[test]
    fn test_register_emits_discovered_once() {
        let gossip = protocol();
        let discovered = Arc::new(AtomicUsize::new(0));
        {
            let discovered = Arc::clone(&discovered);
            gossip.observe(move |event| {
                if matches!(event.kind, GossipEventKind::PeerDiscovered { .. }) {
                    discovered.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        gossip.register(addr("p"), vec![], vec![]);
        gossip.register(addr("p"), vec![], vec![]);

        assert_eq!(discovered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sweep_transitions_and_generations() {
        let gossip = GossipProtocol::new(
            GossipConfig::builder()
                .with_suspect_timeout(std::time::Duration::from_millis(5000))
                .with_dead_timeout(std::time::Duration::from_millis(15_000))
                .build()
                .unwrap(),
        );
        gossip.register(addr("p"), vec![], vec![]);

        // Past the suspect threshold.
        backdate(&gossip, &addr("p"), 5001);
        gossip.sweep();
        let view = gossip.get_peer(&addr("p")).unwrap();
        assert_eq!(view.status, PeerStatus::Suspect);
        assert_eq!(view.generation, 2);

        // Past the dead threshold.
        backdate(&gossip, &addr("p"), 15_001);
        gossip.sweep();
        let view = gossip.get_peer(&addr("p")).unwrap();
        assert_eq!(view.status, PeerStatus::Dead);
        assert_eq!(view.generation, 3);

        // A fresh register restores the peer with a greater generation.
        let view = gossip.register(addr("p"), vec![], vec![]);
        assert_eq!(view.status, PeerStatus::Alive);
        assert_eq!(view.generation, 4);
    }

    #[test]
    fn test_sweep_single_step_per_pass() {
        let gossip = protocol();
        gossip.register(addr("p"), vec![], vec![]);
        backdate(&gossip, &addr("p"), 60_000);

        gossip.sweep();
        assert_eq!(gossip.get_peer(&addr("p")).unwrap().status, PeerStatus::Suspect);
        gossip.sweep();
        assert_eq!(gossip.get_peer(&addr("p")).unwrap().status, PeerStatus::Dead);
    }

    #[test]
    fn test_heartbeat_refreshes_last_seen() {
        let gossip = protocol();
        gossip.register(addr("p"), vec![], vec![]);
        backdate(&gossip, &addr("p"), 60_000);

        assert!(gossip.heartbeat(&addr("p")));
        gossip.sweep();
        assert_eq!(gossip.get_peer(&addr("p")).unwrap().status, PeerStatus::Alive);

        assert!(!gossip.heartbeat(&addr("unknown")));
    }

    #[test]
    fn test_merge_prefers_strictly_greater_generation() {
        let gossip = protocol();
        gossip.register(addr("p"), vec![], vec![]); // generation 1

        let mut stale = PeerView::alive(addr("p"), vec!["stale".to_string()], vec![], 1);
        stale.status = PeerStatus::Dead;
        assert!(gossip.merge(vec![stale]).is_empty());
        assert_eq!(gossip.get_peer(&addr("p")).unwrap().status, PeerStatus::Alive);

        let fresher = PeerView::alive(addr("p"), vec!["fresh".to_string()], vec![], 5);
        let changed = gossip.merge(vec![fresher]);
        assert_eq!(changed.len(), 1);
        assert_eq!(gossip.get_peer(&addr("p")).unwrap().generation, 5);
    }

    #[test]
    fn test_merge_into_empty_reproduces_state() {
        let source = protocol();
        source.register(addr("p1"), vec!["rust".to_string()], vec![]);
        source.register(addr("p2"), vec![], vec![]);

        // Serialize then merge into an empty protocol.
        let encoded = serde_json::to_string(&source.get_view()).unwrap();
        let views: Vec<PeerView> = serde_json::from_str(&encoded).unwrap();

        let target = protocol();
        let changed = target.merge(views);
        assert_eq!(changed.len(), 2);

        let mut source_view = source.get_view();
        let mut target_view = target.get_view();
        source_view.sort_by(|a, b| a.id.cmp(&b.id));
        target_view.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(source_view, target_view);
    }

    #[test]
    fn test_select_targets_alive_only_respects_fanout() {
        let gossip = GossipProtocol::new(
            GossipConfig::builder().with_fanout(2).build().unwrap(),
        );
        for name in ["a", "b", "c", "d"] {
            gossip.register(addr(name), vec![], vec![]);
        }
        backdate(&gossip, &addr("d"), 60_000);
        gossip.sweep(); // d becomes suspect

        let targets = gossip.select_targets(&[addr("a")]);
        assert_eq!(targets.len(), 2);
        for target in &targets {
            assert_ne!(target.id, addr("a"));
            assert_ne!(target.id, addr("d"));
            assert_eq!(target.status, PeerStatus::Alive);
        }
    }

    #[test]
    fn test_find_by_expertise_skips_non_alive() {
        let gossip = protocol();
        gossip.register(addr("a"), vec!["rust".to_string()], vec![]);
        gossip.register(addr("b"), vec!["rust".to_string()], vec![]);
        gossip.register(addr("c"), vec!["go".to_string()], vec![]);
        backdate(&gossip, &addr("b"), 60_000);
        gossip.sweep();

        let found = gossip.find_by_expertise("rust");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, addr("a"));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_cancels() {
        let gossip = GossipProtocol::new(
            GossipConfig::builder()
                .with_interval(std::time::Duration::from_millis(10))
                .with_suspect_timeout(std::time::Duration::from_millis(20))
                .with_dead_timeout(std::time::Duration::from_millis(50))
                .build()
                .unwrap(),
        );
        gossip.register(addr("p"), vec![], vec![]);

        gossip.start();
        gossip.start(); // replaces the previous timer

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert_ne!(gossip.get_peer(&addr("p")).unwrap().status, PeerStatus::Alive);

        gossip.destroy();
        assert!(gossip.inner.sweep_task.lock().is_none());
    }

    #[test]
    fn test_unregister() {
        let gossip = protocol();
        gossip.register(addr("p"), vec![], vec![]);

        assert!(gossip.unregister(&addr("p")));
        assert!(!gossip.unregister(&addr("p")));
        assert_eq!(gossip.peer_count(), 0);
    }
}

//! End-to-end store scenarios.

use lattice_core::agent::{AgentRegistration, AgentState, AgentUpdate, Gpu};
use lattice_core::clock::ManualClock;
use lattice_core::ports::Storage;
use lattice_core::session::{GpuRequest, SessionGpu, SessionRequirements, SessionState};
use lattice_core::Error;
use lattice_store::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn registration(vram: u64, max_sessions: u32) -> AgentRegistration {
    AgentRegistration {
        address: "10.0.0.1:4400".to_string(),
        tags: HashMap::new(),
        taints: HashMap::new(),
        gpus: vec![Gpu {
            index: 0,
            name: "test-gpu".to_string(),
            vram,
        }],
        max_sessions,
    }
}

fn requirements(vram: u64) -> SessionRequirements {
    SessionRequirements {
        version: "1.0".to_string(),
        gpus: vec![GpuRequest { vram }],
        tags: HashMap::new(),
        tolerates: HashMap::new(),
    }
}

fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn register_and_fetch() {
    let storage = MemoryStore::new();

    let id = storage.register_agent(registration(8192, 2)).await.unwrap();

    let agent = storage.get_agent(id).await.unwrap();
    assert_eq!(agent.state, AgentState::Active);
    assert_eq!(agent.vram_available, 8192);
    assert_eq!(agent.sessions_available, 2);
    assert!(agent.sessions.is_empty());
}

#[tokio::test]
async fn queue_match_assign() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();

    let session_id = storage.request_session(requirements(4096)).await.unwrap();
    let queued = storage.list_queued_sessions().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, session_id);

    let matches = storage
        .list_available_agents(4096, &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, agent_id);

    storage
        .assign_session(
            session_id,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 4096,
            }],
        )
        .await
        .unwrap();

    let agent = storage.get_agent(agent_id).await.unwrap();
    assert_eq!(agent.vram_available, 4096);
    assert_eq!(agent.sessions_available, 1);
    assert_eq!(agent.sessions.len(), 1);
    assert_eq!(agent.sessions[0].id, session_id);
    assert_eq!(agent.sessions[0].state, SessionState::Assigned);

    let session = storage.get_session(session_id).await.unwrap();
    assert_eq!(session.state, SessionState::Assigned);
    assert_eq!(session.agent_id, Some(agent_id));
    assert_eq!(session.address.as_deref(), Some("10.0.0.1:4400"));
    assert!(storage.list_queued_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn taints_require_tolerance() {
    let storage = MemoryStore::new();
    let mut reg = registration(8192, 2);
    reg.taints = labels(&[("gpu-class", "a100")]);
    storage.register_agent(reg).await.unwrap();

    let untolerated = storage
        .list_available_agents(4096, &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert!(untolerated.is_empty());

    let tolerated = storage
        .list_available_agents(4096, &HashMap::new(), &labels(&[("gpu-class", "a100")]))
        .await
        .unwrap();
    assert_eq!(tolerated.len(), 1);
}

#[tokio::test]
async fn required_tags_must_be_present() {
    let storage = MemoryStore::new();
    let mut reg = registration(8192, 2);
    reg.tags = labels(&[("zone", "us-east"), ("gen", "hopper")]);
    storage.register_agent(reg).await.unwrap();

    let matched = storage
        .list_available_agents(0, &labels(&[("zone", "us-east")]), &HashMap::new())
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);

    let unmatched = storage
        .list_available_agents(0, &labels(&[("zone", "eu-west")]), &HashMap::new())
        .await
        .unwrap();
    assert!(unmatched.is_empty());
}

#[tokio::test]
async fn heartbeat_closes_session() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();
    let session_id = storage.request_session(requirements(4096)).await.unwrap();
    storage
        .assign_session(
            session_id,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 4096,
            }],
        )
        .await
        .unwrap();

    storage
        .update_agent(AgentUpdate {
            id: agent_id,
            state: AgentState::Active,
            sessions: HashMap::from([(session_id, SessionState::Closed)]),
        })
        .await
        .unwrap();

    assert!(matches!(
        storage.get_session(session_id).await,
        Err(Error::NotFound(_))
    ));
    let agent = storage.get_agent(agent_id).await.unwrap();
    assert_eq!(agent.vram_available, 8192);
    assert_eq!(agent.sessions_available, 2);
    assert!(agent.sessions.is_empty());
}

#[tokio::test]
async fn heartbeat_replay_is_idempotent() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();
    let session_id = storage.request_session(requirements(4096)).await.unwrap();
    storage
        .assign_session(
            session_id,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 4096,
            }],
        )
        .await
        .unwrap();

    let update = AgentUpdate {
        id: agent_id,
        state: AgentState::Active,
        sessions: HashMap::from([(session_id, SessionState::Active)]),
    };
    storage.update_agent(update.clone()).await.unwrap();
    let once = storage.get_agent(agent_id).await.unwrap();

    storage.update_agent(update).await.unwrap();
    let twice = storage.get_agent(agent_id).await.unwrap();

    assert_eq!(once.vram_available, twice.vram_available);
    assert_eq!(once.sessions_available, twice.sessions_available);
    assert_eq!(once.sessions, twice.sessions);
    assert_eq!(
        storage.get_session(session_id).await.unwrap().state,
        SessionState::Active
    );
}

#[tokio::test]
async fn heartbeat_ignores_unknown_sessions() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();
    // A session that was never placed on this agent.
    let stray = storage.request_session(requirements(1024)).await.unwrap();

    storage
        .update_agent(AgentUpdate {
            id: agent_id,
            state: AgentState::Active,
            sessions: HashMap::from([(stray, SessionState::Closed)]),
        })
        .await
        .unwrap();

    // The stray session is untouched and the agent's capacity unchanged.
    assert_eq!(
        storage.get_session(stray).await.unwrap().state,
        SessionState::Queued
    );
    let agent = storage.get_agent(agent_id).await.unwrap();
    assert_eq!(agent.vram_available, 8192);
    assert_eq!(agent.sessions_available, 2);
}

#[tokio::test]
async fn missing_then_removed() {
    let clock = Arc::new(ManualClock::new(10_000));
    let storage = MemoryStore::with_clock(clock.clone());
    let id = storage.register_agent(registration(8192, 2)).await.unwrap();

    clock.advance(120);
    storage
        .mark_agents_missing(Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        storage.get_agent(id).await.unwrap().state,
        AgentState::Missing
    );

    // Removal is measured from promotion time, not last heartbeat.
    storage
        .remove_missing_agents(Duration::from_secs(300))
        .await
        .unwrap();
    assert!(storage.get_agent(id).await.is_ok());

    clock.advance(301);
    storage
        .remove_missing_agents(Duration::from_secs(300))
        .await
        .unwrap();
    assert!(storage.get_agent(id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn fresh_agents_survive_reaping() {
    let clock = Arc::new(ManualClock::new(10_000));
    let storage = MemoryStore::with_clock(clock.clone());
    let stale = storage.register_agent(registration(8192, 2)).await.unwrap();

    clock.advance(120);
    let fresh = storage.register_agent(registration(8192, 2)).await.unwrap();
    storage
        .mark_agents_missing(Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(
        storage.get_agent(stale).await.unwrap().state,
        AgentState::Missing
    );
    assert_eq!(
        storage.get_agent(fresh).await.unwrap().state,
        AgentState::Active
    );
}

#[tokio::test]
async fn removal_fails_hosted_sessions() {
    let clock = Arc::new(ManualClock::new(10_000));
    let storage = MemoryStore::with_clock(clock.clone());
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();
    let session_id = storage.request_session(requirements(4096)).await.unwrap();
    storage
        .assign_session(
            session_id,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 4096,
            }],
        )
        .await
        .unwrap();

    clock.advance(120);
    storage
        .mark_agents_missing(Duration::from_secs(60))
        .await
        .unwrap();
    clock.advance(301);
    storage
        .remove_missing_agents(Duration::from_secs(300))
        .await
        .unwrap();

    assert!(storage.get_agent(agent_id).await.unwrap_err().is_not_found());
    let session = storage.get_session(session_id).await.unwrap();
    assert_eq!(session.state, SessionState::Failed);
    assert_eq!(session.agent_id, None);
    assert_eq!(session.address, None);
    assert!(session.gpus.is_empty());
}

#[tokio::test]
async fn concurrent_assign_race_admits_exactly_one() {
    let storage = Arc::new(MemoryStore::new());
    let agent_id = storage.register_agent(registration(8192, 4)).await.unwrap();
    let first = storage.request_session(requirements(6144)).await.unwrap();
    let second = storage.request_session(requirements(6144)).await.unwrap();

    let a = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            storage
                .assign_session(
                    first,
                    agent_id,
                    vec![SessionGpu {
                        index: 0,
                        vram: 6144,
                    }],
                )
                .await
        })
    };
    let b = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            storage
                .assign_session(
                    second,
                    agent_id,
                    vec![SessionGpu {
                        index: 0,
                        vram: 6144,
                    }],
                )
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::CapacityExhausted { .. })));

    let agent = storage.get_agent(agent_id).await.unwrap();
    assert_eq!(agent.vram_available, 2048);
    assert_eq!(agent.sessions.len(), 1);
}

#[tokio::test]
async fn session_slots_limit_placement() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 1)).await.unwrap();
    let first = storage.request_session(requirements(1024)).await.unwrap();
    let second = storage.request_session(requirements(1024)).await.unwrap();

    storage
        .assign_session(
            first,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 1024,
            }],
        )
        .await
        .unwrap();

    // Plenty of VRAM left, but no session slot.
    let matches = storage
        .list_available_agents(1024, &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert!(matches.is_empty());

    let err = storage
        .assign_session(
            second,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 1024,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExhausted { .. }));
}

#[tokio::test]
async fn matching_snapshot_outlives_later_writes() {
    let storage = MemoryStore::new();
    let agent_id = storage.register_agent(registration(8192, 2)).await.unwrap();

    let matches = storage
        .list_available_agents(0, &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    // Consume the materialized result after further commits.
    let session_id = storage.request_session(requirements(8192)).await.unwrap();
    storage
        .assign_session(
            session_id,
            agent_id,
            vec![SessionGpu {
                index: 0,
                vram: 8192,
            }],
        )
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].vram_available, 8192);
}

#[tokio::test]
async fn get_queued_session_returns_requirements() {
    let storage = MemoryStore::new();
    let session_id = storage.request_session(requirements(2048)).await.unwrap();

    let queued = storage.get_queued_session(session_id).await.unwrap();
    assert_eq!(queued.id, session_id);
    assert_eq!(queued.requirements.total_vram(), 2048);

    assert!(storage
        .get_queued_session(lattice_core::SessionId::new())
        .await
        .unwrap_err()
        .is_not_found());
}

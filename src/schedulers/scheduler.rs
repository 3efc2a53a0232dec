use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::event_bus::EventEmitter;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Scheduler-owned state carried across supersteps: per-node-id record of
/// the channel versions last seen, keyed by channel name (`"messages"`,
/// `"extra"`, `"errors"`, `"documents"`, `"outline"`, `"sections"`,
/// `"quality"`). A node reruns only when at least one of its recorded
/// channel versions has advanced since.
#[derive(Clone, Debug, Default)]
pub struct SchedulerState {
    pub versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
}

fn channel_versions(snapshot: &StateSnapshot) -> FxHashMap<String, u64> {
    [
        ("messages".to_string(), u64::from(snapshot.messages_version)),
        ("extra".to_string(), u64::from(snapshot.extra_version)),
        ("errors".to_string(), u64::from(snapshot.errors_version)),
        ("documents".to_string(), u64::from(snapshot.documents_version)),
        ("outline".to_string(), u64::from(snapshot.outline_version)),
        ("sections".to_string(), u64::from(snapshot.sections_version)),
        ("quality".to_string(), u64::from(snapshot.quality_version)),
    ]
    .into_iter()
    .collect()
}

/// Failures raised while running a superstep.
#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("node {kind:?} failed at step {step}: {source}")]
    #[diagnostic(code(synthgraph::schedulers::node_run))]
    NodeRun {
        kind: NodeKind,
        step: u64,
        source: NodeError,
    },

    #[error("node task failed to join: {0}")]
    #[diagnostic(code(synthgraph::schedulers::join))]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of one superstep: which nodes ran, which were skipped (virtual
/// endpoints or version-gated), and the partial state each ran node produced.
#[derive(Debug, Default)]
pub struct StepRunResult {
    pub ran_nodes: Vec<NodeKind>,
    pub skipped_nodes: Vec<NodeKind>,
    pub outputs: Vec<(NodeKind, NodePartial)>,
}

/// Bounded-concurrency executor for one superstep's frontier.
#[derive(Clone, Debug)]
pub struct Scheduler {
    pub concurrency_limit: usize,
}

impl Scheduler {
    /// `default_limit` caps how many frontier nodes run concurrently within
    /// a single superstep.
    #[must_use]
    pub fn new(default_limit: usize) -> Self {
        Self {
            concurrency_limit: default_limit.max(1),
        }
    }

    /// Whether `id` should run against `snapshot`: true when no prior record
    /// exists, or when any channel's version has advanced since it was last
    /// recorded seen.
    #[must_use]
    pub fn should_run(&self, state: &SchedulerState, id: &str, snapshot: &StateSnapshot) -> bool {
        match state.versions_seen.get(id) {
            None => true,
            Some(seen) => *seen != channel_versions(snapshot),
        }
    }

    /// Record that `id` has run against the channel versions in `snapshot`.
    pub fn record_seen(&self, state: &mut SchedulerState, id: &str, snapshot: &StateSnapshot) {
        state
            .versions_seen
            .insert(id.to_string(), channel_versions(snapshot));
    }

    /// Run every ready node in `frontier`, skipping virtual endpoints and
    /// version-gated nodes, bounded to `concurrency_limit` concurrent tasks.
    ///
    /// `ran_nodes` preserves the frontier's relative order; `outputs` may
    /// complete in any order since tasks run concurrently.
    pub async fn superstep(
        &self,
        scheduler_state: &mut SchedulerState,
        nodes: &FxHashMap<NodeKind, Arc<dyn Node>>,
        frontier: Vec<NodeKind>,
        snapshot: StateSnapshot,
        step: u64,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<StepRunResult, SchedulerError> {
        let mut ran_nodes = Vec::new();
        let mut skipped_nodes = Vec::new();
        let mut to_run = Vec::new();

        for kind in frontier {
            if matches!(kind, NodeKind::Start | NodeKind::End) {
                skipped_nodes.push(kind);
                continue;
            }
            let id = kind.encode();
            if self.should_run(scheduler_state, &id, &snapshot) {
                ran_nodes.push(kind.clone());
                to_run.push((kind, id));
            } else {
                skipped_nodes.push(kind);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut joins: JoinSet<(NodeKind, Result<NodePartial, NodeError>)> = JoinSet::new();

        for (kind, id) in &to_run {
            let Some(node) = nodes.get(kind) else {
                continue;
            };
            let node = Arc::clone(node);
            let kind = kind.clone();
            let snapshot = snapshot.clone();
            let ctx = NodeContext {
                node_id: id.clone(),
                step,
                event_emitter: Arc::clone(&emitter),
            };
            let permit = Arc::clone(&semaphore);
            joins.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let result = node.run(snapshot, ctx).await;
                (kind, result)
            });
        }

        let mut outputs = Vec::with_capacity(to_run.len());
        while let Some(joined) = joins.join_next().await {
            let (kind, result) = joined?;
            let partial = result.map_err(|source| SchedulerError::NodeRun {
                kind: kind.clone(),
                step,
                source,
            })?;
            outputs.push((kind, partial));
        }

        for (_, id) in &to_run {
            self.record_seen(scheduler_state, id, &snapshot);
        }

        Ok(StepRunResult {
            ran_nodes,
            skipped_nodes,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use async_trait::async_trait;

    struct EchoNode {
        label: &'static str,
    }

    #[async_trait]
    impl Node for EchoNode {
        async fn run(
            &self,
            _snapshot: StateSnapshot,
            _ctx: NodeContext,
        ) -> Result<NodePartial, NodeError> {
            Ok(NodePartial {
                extra: Some(
                    [(self.label.to_string(), serde_json::json!(true))]
                        .into_iter()
                        .collect(),
                ),
                ..Default::default()
            })
        }
    }

    struct FailingNode;

    #[async_trait]
    impl Node for FailingNode {
        async fn run(
            &self,
            _snapshot: StateSnapshot,
            _ctx: NodeContext,
        ) -> Result<NodePartial, NodeError> {
            Err(NodeError::MissingInput { what: "test_key" })
        }
    }

    fn snapshot(messages_version: u32, extra_version: u32) -> StateSnapshot {
        StateSnapshot {
            messages: Vec::new(),
            messages_version,
            extra: Default::default(),
            extra_version,
            errors: Vec::new(),
            errors_version: 0,
            documents: Vec::new(),
            documents_version: 0,
            outline: None,
            outline_version: 0,
            sections: Default::default(),
            sections_version: 0,
            quality: None,
            quality_version: 0,
        }
    }

    fn registry(labels: &[&'static str]) -> FxHashMap<NodeKind, Arc<dyn Node>> {
        labels
            .iter()
            .map(|label| {
                (
                    NodeKind::Custom((*label).to_string()),
                    Arc::new(EchoNode { label }) as Arc<dyn Node>,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn superstep_propagates_node_error() {
        let sched = Scheduler::new(4);
        let mut state = SchedulerState::default();
        let mut nodes: FxHashMap<NodeKind, Arc<dyn Node>> = FxHashMap::default();
        nodes.insert(NodeKind::Custom("FAIL".into()), Arc::new(FailingNode));
        let frontier = vec![NodeKind::Custom("FAIL".into())];
        let bus = EventBus::default();

        let result = sched
            .superstep(&mut state, &nodes, frontier, snapshot(1, 1), 1, bus.get_emitter())
            .await;

        match result {
            Err(SchedulerError::NodeRun {
                source: NodeError::MissingInput { what },
                ..
            }) => assert_eq!(what, "test_key"),
            other => panic!("expected NodeRun(MissingInput), got {other:?}"),
        }
    }

    #[test]
    fn should_run_gates_on_any_channel_version() {
        let sched = Scheduler::new(4);
        let mut state = SchedulerState::default();
        let id = "Custom:A";

        let snap1 = snapshot(1, 1);
        assert!(sched.should_run(&state, id, &snap1));

        sched.record_seen(&mut state, id, &snap1);
        assert!(!sched.should_run(&state, id, &snap1));

        let snap2 = snapshot(2, 1);
        assert!(sched.should_run(&state, id, &snap2));

        sched.record_seen(&mut state, id, &snap2);
        let snap3 = snapshot(2, 3);
        assert!(sched.should_run(&state, id, &snap3));
    }

    #[tokio::test]
    async fn superstep_skips_virtual_endpoints_and_regated_nodes() {
        let sched = Scheduler::new(8);
        let mut state = SchedulerState::default();
        let nodes = registry(&["A", "B"]);
        let frontier = vec![
            NodeKind::Custom("A".into()),
            NodeKind::End,
            NodeKind::Custom("B".into()),
        ];
        let bus = EventBus::default();

        let snap = snapshot(1, 1);
        let res1 = sched
            .superstep(&mut state, &nodes, frontier.clone(), snap.clone(), 1, bus.get_emitter())
            .await
            .unwrap();

        assert!(res1.ran_nodes.contains(&NodeKind::Custom("A".into())));
        assert!(res1.ran_nodes.contains(&NodeKind::Custom("B".into())));
        assert!(!res1.ran_nodes.contains(&NodeKind::End));
        assert!(res1.skipped_nodes.contains(&NodeKind::End));
        assert_eq!(res1.outputs.len(), 2);

        let res2 = sched
            .superstep(&mut state, &nodes, frontier.clone(), snap.clone(), 2, bus.get_emitter())
            .await
            .unwrap();
        assert!(res2.ran_nodes.is_empty());
        assert!(res2.skipped_nodes.contains(&NodeKind::Custom("A".into())));
        assert!(res2.skipped_nodes.contains(&NodeKind::Custom("B".into())));
        assert!(res2.outputs.is_empty());

        let snap_bump = snapshot(2, 1);
        let res3 = sched
            .superstep(&mut state, &nodes, frontier, snap_bump, 3, bus.get_emitter())
            .await
            .unwrap();
        assert_eq!(res3.outputs.len(), 2);
    }

    #[tokio::test]
    async fn superstep_preserves_frontier_order_in_ran_nodes() {
        let sched = Scheduler::new(2);
        let mut state = SchedulerState::default();
        let nodes = registry(&["A", "B"]);
        let frontier = vec![NodeKind::Custom("A".into()), NodeKind::Custom("B".into())];
        let bus = EventBus::default();

        let res = sched
            .superstep(&mut state, &nodes, frontier.clone(), snapshot(1, 1), 1, bus.get_emitter())
            .await
            .unwrap();

        assert_eq!(res.ran_nodes, frontier);
    }
}

/// Graph compiler: flow graph -> executable action tree
///
/// Runs once per deploy. Validates the graph (single trigger, known edge
/// endpoints, no cycles) and then walks it depth-first into a canonical
/// action tree, recognizing linear chains, conditional branches, and
/// parallel fan-out/fan-in regions bounded by a merge barrier.

use crate::error::CompileError;
use crate::workflow::types::{
    ActionNode, FlowEdge, FlowGraph, FlowNode, RuleGroup, TriggerSpec, TRIGGER_TYPES,
};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{HashMap, HashSet};

/// Output of a successful compilation
#[derive(Debug, Clone)]
pub struct CompiledFlow {
    /// Parsed trigger descriptor from the single trigger node
    pub trigger: TriggerSpec,
    pub trigger_node_id: String,
    /// The canonical action tree, in chain order
    pub actions: Vec<ActionNode>,
}

/// Result of compiling one segment of the walk
///
/// `stopped_at` reports a merge barrier the segment halted in front of
/// without consuming it; the parent scope decides whether its sibling
/// branches reconverge there.
struct Segment {
    actions: Vec<ActionNode>,
    stopped_at: Option<String>,
}

/// Compile a flow graph into an executable action tree
///
/// Fails with a `CompileError` before anything is persisted or queued.
pub fn compile(graph: &FlowGraph) -> Result<CompiledFlow, CompileError> {
    let compiler = Compiler::validate(graph)?;

    let trigger_node = compiler.trigger_node;
    let trigger = TriggerSpec::from_node(trigger_node)?;

    tracing::debug!(
        trigger = %trigger_node.id,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "compiling flow graph"
    );

    let root = compiler.build_segment(&trigger_node.id, HashSet::new())?;

    tracing::info!(
        trigger = %trigger_node.id,
        actions = root.actions.len(),
        "compiled flow graph"
    );

    Ok(CompiledFlow {
        trigger,
        trigger_node_id: trigger_node.id.clone(),
        actions: root.actions,
    })
}

struct Compiler<'a> {
    nodes: HashMap<&'a str, &'a FlowNode>,
    /// Outgoing edges per node, in edge-enumeration order (branch order
    /// follows it)
    outgoing: HashMap<&'a str, Vec<&'a FlowEdge>>,
    /// Incoming-edge count; > 1 marks a merge-barrier candidate
    in_degree: HashMap<&'a str, usize>,
    trigger_node: &'a FlowNode,
}

impl<'a> Compiler<'a> {
    /// Structural validation: known edge endpoints, exactly one trigger,
    /// acyclic graph (petgraph toposort).
    fn validate(graph: &'a FlowGraph) -> Result<Self, CompileError> {
        let nodes = graph.node_index();

        let mut outgoing: HashMap<&str, Vec<&FlowEdge>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for edge in &graph.edges {
            if !nodes.contains_key(edge.source.as_str()) {
                return Err(CompileError::UnknownNode(edge.source.clone()));
            }
            if !nodes.contains_key(edge.target.as_str()) {
                return Err(CompileError::UnknownNode(edge.target.clone()));
            }
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
            *in_degree.entry(edge.target.as_str()).or_default() += 1;
        }

        let triggers: Vec<&FlowNode> = graph
            .nodes
            .iter()
            .filter(|n| TRIGGER_TYPES.contains(&n.node_type.as_str()))
            .collect();
        let trigger_node = match triggers.len() {
            0 => return Err(CompileError::NoTrigger),
            1 => triggers[0],
            n => return Err(CompileError::MultipleTriggers(n)),
        };

        // Cycle rejection up front; the recursive walk assumes a DAG.
        let mut dag: DiGraph<&str, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for node in &graph.nodes {
            indices.insert(node.id.as_str(), dag.add_node(node.id.as_str()));
        }
        for edge in &graph.edges {
            dag.add_edge(indices[edge.source.as_str()], indices[edge.target.as_str()], ());
        }
        if toposort(&dag, None).is_err() {
            return Err(CompileError::CyclicGraph);
        }

        Ok(Self { nodes, outgoing, in_degree, trigger_node })
    }

    fn is_merge_barrier(&self, id: &str) -> bool {
        self.in_degree.get(id).copied().unwrap_or(0) > 1
    }

    /// Depth-first segment walk
    ///
    /// Each condition or fan-out branch recurses with its own copy of the
    /// visited set, so siblings don't falsely suppress shared downstream
    /// nodes; a node already visited on the *same* linear path is never
    /// re-emitted.
    fn build_segment(
        &self,
        start_id: &str,
        mut visited: HashSet<String>,
    ) -> Result<Segment, CompileError> {
        let mut actions = Vec::new();
        let mut current: Option<String> = Some(start_id.to_string());
        // Set after a resolved fork so the shared merge node passes the
        // barrier check exactly once.
        let mut just_resolved_merge = false;

        while let Some(id) = current {
            if visited.contains(&id) {
                break;
            }

            if self.is_merge_barrier(&id) && id != start_id && !just_resolved_merge {
                // Halt in front of the barrier; the parent scope handles
                // the merge. The node itself is not consumed here.
                return Ok(Segment { actions, stopped_at: Some(id) });
            }
            just_resolved_merge = false;

            visited.insert(id.clone());
            let node = self
                .nodes
                .get(id.as_str())
                .ok_or_else(|| CompileError::UnknownNode(id.clone()))?;

            if node.node_type == "condition" {
                actions.push(self.compile_condition(node, &visited)?);
                // Condition branches terminate the main chain.
                return Ok(Segment { actions, stopped_at: None });
            }

            if !TRIGGER_TYPES.contains(&node.node_type.as_str()) {
                actions.push(self.compile_step(node)?);
            }

            let outgoing = self.outgoing.get(id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            match outgoing {
                [] => current = None,
                [edge] => current = Some(edge.target.clone()),
                edges => {
                    let (parallel, resume_at) =
                        self.compile_fan_out(node, edges, &visited)?;
                    actions.push(parallel);
                    just_resolved_merge = resume_at.is_some();
                    current = resume_at;
                }
            }
        }

        Ok(Segment { actions, stopped_at: None })
    }

    /// Condition node: compile both labeled branches with independent
    /// visited-set copies; exactly one runs at execution time.
    fn compile_condition(
        &self,
        node: &FlowNode,
        visited: &HashSet<String>,
    ) -> Result<ActionNode, CompileError> {
        let rules = self.parse_rules(node)?;

        let branch = |handle: &str| -> Result<Vec<ActionNode>, CompileError> {
            let edge = self
                .outgoing
                .get(node.id.as_str())
                .and_then(|edges| {
                    edges.iter().find(|e| e.handle.as_deref() == Some(handle))
                });
            match edge {
                Some(e) => Ok(self.build_segment(&e.target, visited.clone())?.actions),
                None => Ok(Vec::new()),
            }
        };

        Ok(ActionNode::Condition {
            id: node.id.clone(),
            rules,
            true_branch: branch("true")?,
            false_branch: branch("false")?,
            gate: self.parse_gate(node)?,
        })
    }

    /// Unlabeled fan-out: compile every branch, then detect fan-in
    ///
    /// Branches that all halt at the identical downstream node form a
    /// resolved parallel region and the main walk resumes at that node.
    /// Branches that all terminate are a legal non-merging region. Anything
    /// else reconverges inconsistently and is rejected outright rather than
    /// silently truncated.
    fn compile_fan_out(
        &self,
        node: &FlowNode,
        edges: &[&FlowEdge],
        visited: &HashSet<String>,
    ) -> Result<(ActionNode, Option<String>), CompileError> {
        let mut branches = Vec::with_capacity(edges.len());
        let mut stops = Vec::with_capacity(edges.len());
        for edge in edges {
            let segment = self.build_segment(&edge.target, visited.clone())?;
            branches.push(segment.actions);
            stops.push(segment.stopped_at);
        }

        let parallel = ActionNode::Parallel {
            id: format!("parallel_{}", node.id),
            branches,
            gate: self.parse_gate(node)?,
        };

        let reached: Vec<&String> = stops.iter().flatten().collect();
        if reached.is_empty() {
            // All branches ran to completion; nothing to resume.
            return Ok((parallel, None));
        }

        let unique: HashSet<&String> = reached.iter().copied().collect();
        if reached.len() == stops.len() && unique.len() == 1 {
            // Same stop requires exact node-id identity.
            return Ok((parallel, Some(reached[0].clone())));
        }

        let mut stop_ids: Vec<String> = unique.into_iter().cloned().collect();
        stop_ids.sort();
        Err(CompileError::DivergentMerge { stops: stop_ids })
    }

    /// Emit a Step for a plain action node, lifting an optional gate rule
    /// out of its config.
    fn compile_step(&self, node: &FlowNode) -> Result<ActionNode, CompileError> {
        let mut inputs = node.config.clone();
        inputs.remove("gate");
        Ok(ActionNode::Step {
            id: node.id.clone(),
            action: node.node_type.clone(),
            inputs,
            gate: self.parse_gate(node)?,
        })
    }

    fn parse_rules(&self, node: &FlowNode) -> Result<RuleGroup, CompileError> {
        let logic = node.config.get("logic").ok_or_else(|| CompileError::InvalidCondition {
            node: node.id.clone(),
            reason: "missing 'logic' rule tree".into(),
        })?;
        serde_json::from_value(logic.clone()).map_err(|e| CompileError::InvalidCondition {
            node: node.id.clone(),
            reason: e.to_string(),
        })
    }

    fn parse_gate(&self, node: &FlowNode) -> Result<Option<RuleGroup>, CompileError> {
        match node.config.get("gate") {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| CompileError::InvalidGate {
                    node: node.id.clone(),
                    reason: e.to_string(),
                }),
        }
    }
}

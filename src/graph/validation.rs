// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural checks and ordering over a [`Topology`].
//!
//! # Cycle Detection
//! Depth-first search with three colors:
//! - **White** (not in `visited`): not yet explored
//! - **Gray** (in `rec_stack`): on the current DFS path
//! - **Black** (in `visited`, not in `rec_stack`): fully explored
//!
//! Reaching a gray node closes a cycle; the path from that node to the current one, plus the
//! back edge, is reported. Nodes and successors are visited in id order, so the reported cycle
//! is deterministic.
//!
//! # Ordering
//! Kahn's algorithm with an ordered ready set: among nodes whose in-degree has dropped to zero,
//! the smallest id goes first.

use crate::errors::BuildError;
use crate::graph::Topology;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Runs every check and accumulates all failures.
pub fn validate_topology(topology: &Topology) -> Result<(), Vec<BuildError>> {
    let mut errors = Vec::new();

    if let Some(cycle) = find_cycle(topology) {
        errors.push(BuildError::CycleDetected { cycle });
    }
    errors.extend(unbound_required_ports(topology));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every required input port without an incoming connection.
pub fn unbound_required_ports(topology: &Topology) -> Vec<BuildError> {
    let mut errors = Vec::new();
    for descriptor in topology.nodes() {
        for port in descriptor.ports.inputs().iter().filter(|p| p.required) {
            if topology.binding(&descriptor.id, &port.name).is_none() {
                errors.push(BuildError::UnboundRequiredPort {
                    node_id: descriptor.id.clone(),
                    port: port.name.clone(),
                });
            }
        }
    }
    errors
}

/// Returns the first cycle found, first node repeated at the end.
pub fn find_cycle(topology: &Topology) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in topology.node_ids() {
        if !visited.contains(node) {
            if let Some(cycle) =
                dfs_cycle_detection(node, topology, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_cycle_detection(
    node: &str,
    topology: &Topology,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    for neighbor in topology.successors(node) {
        if !visited.contains(neighbor) {
            if let Some(cycle) = dfs_cycle_detection(neighbor, topology, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(neighbor) {
            let cycle_start = path.iter().position(|x| x == neighbor).unwrap_or(0);
            let mut cycle = path[cycle_start..].to_vec();
            cycle.push(neighbor.to_string());
            return Some(cycle);
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}

/// Kahn's algorithm with id-ascending tie-break.
pub fn topological_order(topology: &Topology) -> Result<Vec<String>, BuildError> {
    let mut in_degree: HashMap<&str, usize> = topology.node_ids().map(|id| (id, 0)).collect();
    for connection in topology.connections() {
        if let Some(degree) = in_degree.get_mut(connection.to_node.as_str()) {
            *degree += 1;
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(topology.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        for connection in topology.connections().iter().filter(|c| c.from_node == node) {
            if let Some(degree) = in_degree.get_mut(connection.to_node.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(connection.to_node.as_str());
                }
            }
        }
    }

    if order.len() == topology.len() {
        Ok(order)
    } else {
        Err(BuildError::CycleDetected {
            cycle: find_cycle(topology).unwrap_or_default(),
        })
    }
}

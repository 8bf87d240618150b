// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reconciliation of cached object nodes against a fresh session query.
//!
//! Matching rules, in order:
//!
//! 1. One fresh object and one cached node: the node is reused in place,
//!    whatever its name.
//! 2. One fresh object and any other number of cached nodes: a new node is
//!    created. More than one candidate is reported as ambiguous.
//! 3. Otherwise objects are matched strictly by name. Unmatched cached nodes
//!    are destroyed and unmatched fresh objects become new nodes.
//!
//! Duplicate names are matched first-come, first-served.

use kiln_core::event::Diagnostic;
use kiln_core::session::ObjectInfo;
use kiln_data::{AssetGraph, ObjectKey};

/// What happens to one fresh object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAction<K> {
    /// Update the cached node `K` in place.
    Reuse(K),
    /// Create a new node.
    Create,
}

/// Outcome of [`plan_reconciliation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan<K> {
    /// One action per fresh object, in fresh order.
    pub actions: Vec<ObjectAction<K>>,
    /// Cached nodes to destroy.
    pub destroyed: Vec<K>,
    /// Non-fatal problems.
    pub diagnostics: Vec<Diagnostic>,
}

/// Decides how `fresh` names map onto `previous` (key, name) pairs.
pub fn plan_reconciliation<K: Copy + PartialEq>(previous: &[(K, &str)], fresh: &[&str]) -> ReconcilePlan<K> {
    let mut diagnostics = Vec::new();

    if fresh.len() == 1 {
        if previous.len() == 1 {
            return ReconcilePlan {
                actions: vec![ObjectAction::Reuse(previous[0].0)],
                destroyed: Vec::new(),
                diagnostics,
            };
        }
        if previous.len() > 1 {
            log::warn!(
                "ObjectLane: cannot match object '{}' among {} previous objects; creating a new one. State may be lost.",
                fresh[0],
                previous.len()
            );
            diagnostics.push(Diagnostic::ReconciliationAmbiguity {
                object: fresh[0].to_string(),
                candidates: previous.len(),
            });
        }
        return ReconcilePlan {
            actions: vec![ObjectAction::Create],
            destroyed: previous.iter().map(|(k, _)| *k).collect(),
            diagnostics,
        };
    }

    let mut unmatched: Vec<(K, &str)> = previous.to_vec();
    let actions = fresh
        .iter()
        .map(|name| match unmatched.iter().position(|(_, n)| n == name) {
            Some(index) => ObjectAction::Reuse(unmatched.remove(index).0),
            None => ObjectAction::Create,
        })
        .collect();

    ReconcilePlan {
        actions,
        destroyed: unmatched.into_iter().map(|(k, _)| k).collect(),
        diagnostics,
    }
}

/// Brings `graph` in line with `fresh`.
///
/// After this call the graph holds exactly one object per fresh entry, in
/// fresh order, with geometry regenerated and instances resolved. Returns the
/// diagnostics gathered while matching.
pub fn reconcile_objects(graph: &mut AssetGraph, fresh: &[ObjectInfo]) -> Vec<Diagnostic> {
    let previous: Vec<(ObjectKey, String)> = graph
        .objects()
        .map(|(key, object)| (key, object.name.clone()))
        .collect();
    let previous_refs: Vec<(ObjectKey, &str)> = previous
        .iter()
        .map(|(key, name)| (*key, name.as_str()))
        .collect();
    let fresh_names: Vec<&str> = fresh.iter().map(|o| o.name.as_str()).collect();
    let plan = plan_reconciliation(&previous_refs, &fresh_names);

    for key in &plan.destroyed {
        graph.remove_object(*key);
    }

    let mut order = Vec::with_capacity(fresh.len());
    for (info, action) in fresh.iter().zip(&plan.actions) {
        let key = match action {
            ObjectAction::Reuse(key) => {
                graph.update_object(*key, &info.name, info.node, info.transform);
                *key
            }
            ObjectAction::Create => graph.insert_object(&info.name, info.node, info.transform),
        };
        graph.apply_geometry(key, info);
        order.push(key);
    }
    graph.set_object_order(&order);
    graph.resolve_instances();

    log::debug!(
        "ObjectLane: reconciled {} object(s), destroyed {}.",
        fresh.len(),
        plan.destroyed.len()
    );
    plan.diagnostics
}

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

mod common;

use common::*;
use kiln_agents::{AssetController, ControllerConfig, RequestOutcome};
use kiln_core::event::Diagnostic;
use kiln_core::session::{MaterialId, ParmModifier, ParmValue, Session};
use kiln_core::{
    AssetEventKind, AssetKind, AssetSource, BuildAction, CookOptions, CookResult, CookStatus,
    CreationMode, Transform,
};
use kiln_infra::{Library, MemorySession};
use std::io::Write;

fn object_names(controller: &AssetController) -> Vec<String> {
    controller.graph().object_names()
}

#[test]
fn first_reload_builds_everything_the_node_exposes() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = controller.subscribe();

    // --- 2. ACT ---
    assert_eq!(controller.request_reload(), RequestOutcome::Queued);
    controller.update(&mut session);

    // --- 3. ASSERT ---
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(events[0].success);
    assert_eq!(events[0].asset, controller.key());
    assert_eq!(events[0].outputs.len(), 2);

    assert_eq!(controller.status(), CookStatus::PostLoad);
    assert_eq!(controller.last_result(), CookResult::Success);
    assert_eq!(controller.asset_name(), "tower");
    assert_eq!(controller.operator_name(), TOWER);
    assert_eq!(object_names(&controller), vec!["tower_0", "tower_1"]);
    assert_eq!(controller.handles().len(), 1);
    assert_eq!(
        controller.materials().get(MaterialId(1)).map(|m| m.name.as_str()),
        Some("stone")
    );
    assert_eq!(controller.inputs().len(), 1);
    assert_eq!(controller.inputs()[0].name, "ground");
    assert_eq!(
        session.node_for_asset(controller.key()),
        controller.node(),
        "the node is registered to the asset"
    );

    // The next tick settles back to idle without doing anything else.
    let cooks = session.cook_call_count();
    controller.update(&mut session);
    assert_eq!(controller.status(), CookStatus::None);
    assert!(controller.is_idle());
    assert_eq!(session.cook_call_count(), cooks);
}

#[test]
fn reloading_twice_yields_the_same_outputs() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let first_outputs = controller.outputs();

    controller.request_reload();
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(controller.outputs(), first_outputs);
    assert_eq!(object_names(&controller), vec!["tower_0", "tower_1"]);
    assert_eq!(
        session.node_count(),
        1 + 2 * 2,
        "the old node and its children were deleted"
    );
}

#[test]
fn async_cook_uploads_edits_and_reports_once() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    controller.update(&mut session);

    // --- 2. ACT ---
    assert!(controller.set_parameter("floors", ParmValue::Int(3)));
    assert!(!controller.set_parameter("missing", ParmValue::Int(3)));
    assert!(controller.requires_recook());
    controller.request_cook(CookOptions::default());
    controller.update(&mut session);

    // --- 3. ASSERT ---
    assert_eq!(controller.status(), CookStatus::Cooking);
    assert!(drain(&events).is_empty(), "nothing is reported mid-cook");

    controller.update(&mut session);
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Cook);
    assert!(events[0].success);
    assert_eq!(events[0].outputs.len(), 3);
    assert_eq!(controller.status(), CookStatus::PostCook);
    assert!(!controller.requires_recook());
    assert_eq!(
        controller.parameters().get("floors"),
        Some(&ParmValue::Int(3))
    );
}

#[test]
fn coalesced_cooks_run_once_and_report_twice() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let cooks = session.cook_call_count();

    assert_eq!(controller.request_cook(CookOptions::default()), RequestOutcome::Queued);
    assert_eq!(
        controller.request_cook(CookOptions::changed_only()),
        RequestOutcome::Coalesced
    );
    tick(&mut controller, &mut session, 3);

    assert_eq!(session.cook_call_count(), cooks + 1);
    let events = drain(&events);
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.kind == AssetEventKind::Cook && e.success));
}

#[test]
fn reload_replaces_a_pending_cook_and_answers_both() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let old_node = controller.node();

    controller.request_cook(CookOptions::default());
    assert_eq!(
        controller.request_reload(),
        RequestOutcome::Replaced(BuildAction::Cook)
    );
    assert_eq!(
        controller.request_cook(CookOptions::default()),
        RequestOutcome::Absorbed(BuildAction::Reload)
    );
    controller.update(&mut session);

    let kinds: Vec<AssetEventKind> = drain(&events).iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![AssetEventKind::Cook, AssetEventKind::Reload, AssetEventKind::Cook]
    );
    assert_ne!(controller.node(), old_node, "the rebuild created a new node");
    assert_eq!(controller.status(), CookStatus::PostLoad);
    assert!(controller.is_idle());
}

#[test]
fn fatal_cook_keeps_the_previous_outputs() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let before = controller.graph().object_keys().to_vec();

    // --- 2. ACT ---
    session.fail_next_cook("divide by zero");
    controller.set_parameter("floors", ParmValue::Int(5));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    // --- 3. ASSERT ---
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(!events[0].success);
    assert!(events[0].outputs.is_empty());
    assert_eq!(controller.last_result(), CookResult::Errored);
    assert_eq!(controller.status(), CookStatus::None);
    assert_eq!(controller.graph().object_keys(), before.as_slice());
    assert_eq!(object_names(&controller), vec!["tower_0", "tower_1"]);
}

#[test]
fn cook_with_warnings_succeeds_with_a_diagnostic() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    session.warn_next_cook("missing texture");
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(
        events[0].diagnostics,
        vec![Diagnostic::CookWarning {
            message: "missing texture".to_string()
        }]
    );
}

#[test]
fn every_request_is_answered_exactly_once() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let forced = CookOptions {
        skip_cook_check: true,
        ..Default::default()
    };

    // --- 2. ACT ---
    // Refused: cooking disabled.
    controller.config_mut().cooking_enabled = false;
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 1);

    // Accepted: the check is skipped.
    controller.request_cook(forced);
    tick(&mut controller, &mut session, 2);

    // Refused: paused, both queued and blocking.
    controller.set_cooking_paused(true);
    controller.request_cook(forced);
    tick(&mut controller, &mut session, 1);
    controller.cook_blocking(&mut session, forced);

    // --- 3. ASSERT ---
    let outcomes: Vec<(AssetEventKind, bool)> =
        drain(&events).iter().map(|e| (e.kind, e.success)).collect();
    assert_eq!(
        outcomes,
        vec![
            (AssetEventKind::Cook, false),
            (AssetEventKind::Cook, true),
            (AssetEventKind::Cook, false),
            (AssetEventKind::Cook, false),
        ]
    );
    assert!(controller.is_cooking_paused());
}

#[test]
fn blocking_requests_while_busy_are_refused() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    controller.request_cook(CookOptions::default());
    controller.update(&mut session);
    assert_eq!(controller.status(), CookStatus::Cooking);

    controller.cook_blocking(&mut session, CookOptions::default());
    controller.reload_blocking(&mut session);
    controller.update(&mut session);

    let outcomes: Vec<(AssetEventKind, bool)> =
        drain(&events).iter().map(|e| (e.kind, e.success)).collect();
    assert_eq!(
        outcomes,
        vec![
            (AssetEventKind::Cook, false),
            (AssetEventKind::Reload, false),
            (AssetEventKind::Cook, true),
        ]
    );
}

#[test]
fn cleared_requests_are_answered_as_failed() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    controller.request_cook(CookOptions::default());
    controller.request_reload();
    controller.clear_build_request();

    assert_eq!(controller.pending_action(), BuildAction::None);
    let events = drain(&events);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| !e.success));

    let cooks = session.cook_call_count();
    tick(&mut controller, &mut session, 2);
    assert_eq!(session.cook_call_count(), cooks);
}

#[test]
fn blocking_cook_polls_until_the_session_is_ready() {
    let mut definition = tower_definition();
    definition.cook_polls = 3;
    let mut session = MemorySession::new();
    session.install_library(
        TOWERS_PATH,
        Library {
            name: "slow".to_string(),
            definitions: vec![definition],
        },
    );
    session.set_object_generator(TOWER, tower_floors);
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    // Asynchronously, one tick starts the cook and each later tick polls once.
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 4);
    assert_eq!(controller.status(), CookStatus::Cooking);
    assert!(drain(&events).is_empty());
    controller.update(&mut session);
    assert_eq!(drain(&events).len(), 1);

    // Blocking, the whole cook happens inside the call.
    controller.post_update();
    controller.cook_blocking(&mut session, CookOptions::default());
    assert_eq!(controller.status(), CookStatus::PostCook);
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
}

#[test]
fn disconnected_session_fails_the_cook_until_restarted() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    session.disconnect();
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let failed = drain(&events);
    assert_eq!(failed.len(), 1);
    assert!(!failed[0].success);
    assert_eq!(controller.last_result(), CookResult::Errored);

    session.restart();
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);
    let recovered = drain(&events);
    assert_eq!(recovered.len(), 1);
    assert!(recovered[0].success);
    assert_eq!(controller.session_id(), Some(session.id()));
}

#[test]
fn restarted_session_recreates_the_node_with_local_edits() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let old_node = controller.node();
    controller.set_parameter("floors", ParmValue::Int(4));

    // --- 2. ACT ---
    session.restart();
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    // --- 3. ASSERT ---
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].outputs.len(), 4);
    assert_ne!(controller.node(), old_node);
    assert_eq!(session.node_for_asset(controller.key()), controller.node());
    assert_eq!(controller.session_id(), Some(session.id()));
}

#[test]
fn node_deleted_behind_the_controller_is_recreated() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let old_node = controller.node().expect("node created");

    session.invalidate_node(old_node);
    controller.set_parameter("floors", ParmValue::Int(1));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].outputs.len(), 1);
    assert_ne!(controller.node(), Some(old_node));
    assert!(session.is_node_valid(controller.node().expect("node recreated")));
}

#[test]
fn objects_are_reconciled_across_cooks() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    // Two objects collapsing into one cannot be matched.
    controller.set_parameter("floors", ParmValue::Int(1));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);
    let collapsed = drain(&events);
    assert_eq!(
        collapsed[0].diagnostics,
        vec![Diagnostic::ReconciliationAmbiguity {
            object: "tower_0".to_string(),
            candidates: 2,
        }]
    );
    let key = controller.graph().object_keys()[0];

    // One object renamed keeps its identity.
    controller.set_parameter("label", ParmValue::Text("spire".to_string()));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);
    assert_eq!(object_names(&controller), vec!["spire_0"]);
    assert_eq!(controller.graph().object_keys(), &[key]);

    // Several objects match by name.
    controller.set_parameter("floors", ParmValue::Int(3));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);
    assert_eq!(object_names(&controller), vec!["spire_0", "spire_1", "spire_2"]);
    assert_eq!(controller.graph().object_keys()[0], key);
    assert_eq!(controller.graph().object_count(), 3);
    assert!(drain(&events).iter().all(|e| e.diagnostics.is_empty()));
}

#[test]
fn missing_library_fails_the_rebuild() {
    let mut session = fixture_session();
    let mut controller = controller_for("nowhere.ron");
    let events = controller.subscribe();

    controller.request_reload();
    controller.update(&mut session);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(!events[0].success);
    assert_eq!(controller.last_result(), CookResult::Errored);
    assert_eq!(controller.node(), None);
    assert_eq!(session.node_count(), 0);
}

#[test]
fn library_can_be_handed_over_from_memory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("towers.ron");
    let text = towers_library().to_ron_string().expect("library serializes");
    std::fs::File::create(&path)
        .and_then(|mut file| file.write_all(text.as_bytes()))
        .expect("library written");

    let mut session = MemorySession::new();
    session.set_object_generator(TOWER, tower_floors);
    let mut source = AssetSource::from_path(path.clone());
    source.load_from_memory = true;
    let mut controller = AssetController::new(
        AssetKind::Definition,
        source,
        ControllerConfig::default(),
        CreationMode::Fresh,
    );

    let _events = loaded(&mut controller, &mut session);
    assert_eq!(session.library_load_count(), 1);
    assert_eq!(object_names(&controller), vec!["tower_0", "tower_1"]);
}

#[test]
fn destroy_removes_everything_from_the_session() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    controller.request_cook(CookOptions::default());

    controller.destroy(&mut session);

    assert_eq!(session.node_count(), 0);
    assert_eq!(session.node_for_asset(controller.key()), None);
    assert_eq!(controller.node(), None);
    assert!(controller.graph().is_empty());
    let events = drain(&events);
    assert_eq!(events.len(), 1, "the pending cook is answered");
    assert!(!events[0].success);
}

#[test]
fn parameter_modifiers_are_applied_before_the_cook() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let _events = loaded(&mut controller, &mut session);

    controller.push_parameter_modifier(ParmModifier::InsertInstance {
        parameter: "floors".to_string(),
        index: 0,
    });
    assert!(controller.requires_recook());
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    assert_eq!(
        controller.parameters().get("floors"),
        Some(&ParmValue::Int(3))
    );
    assert_eq!(controller.graph().object_count(), 3);
    assert!(!controller.requires_recook());
}

#[test]
fn external_cook_is_mirrored_without_uploading() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let node = controller.node().expect("node created");

    controller.set_parameter("floors", ParmValue::Int(6));
    session.simulate_external_cook(node).expect("external cook");
    tick(&mut controller, &mut session, 3);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Cook);
    assert!(events[0].success);
    assert_eq!(
        controller.total_cook_count(),
        session.total_cook_count(node).expect("count")
    );
    assert_eq!(
        controller.graph().object_count(),
        2,
        "the local edit was not uploaded"
    );
}

#[test]
fn transform_change_triggers_a_cook_when_enabled() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    controller.config_mut().transform_change_triggers_cooks = true;
    let events = loaded(&mut controller, &mut session);
    let node = controller.node().expect("node created");
    let moved = Transform::from_translation([1.0, 2.0, 3.0]);

    controller.set_transform(moved);
    controller.update(&mut session);

    let cooked = drain(&events);
    assert_eq!(cooked.len(), 1);
    assert_eq!(cooked[0].kind, AssetEventKind::Cook);
    approx::assert_relative_eq!(
        session.object_transform(node).expect("transform"),
        moved
    );

    let cooks = session.cook_call_count();
    tick(&mut controller, &mut session, 3);
    assert_eq!(session.cook_call_count(), cooks);
    assert!(drain(&events).is_empty());
}

#[test]
fn zero_scale_transform_is_not_uploaded() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let _events = loaded(&mut controller, &mut session);
    let node = controller.node().expect("node created");

    controller.set_transform(Transform::from_translation([4.0, 0.0, 0.0]).with_scale([0.0, 1.0, 1.0]));
    controller.cook_blocking(&mut session, CookOptions::default());

    assert_eq!(
        session.object_transform(node).expect("transform"),
        Transform::IDENTITY
    );
}

#[test]
fn zero_scale_transform_triggers_a_single_cook() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    controller.config_mut().transform_change_triggers_cooks = true;
    let events = loaded(&mut controller, &mut session);
    let node = controller.node().expect("node created");
    let cooks = session.cook_call_count();

    // --- 2. ACT ---
    controller.set_transform(Transform::IDENTITY.with_scale([0.0, 1.0, 1.0]));
    tick(&mut controller, &mut session, 5);

    // --- 3. ASSERT ---
    let cooked = drain(&events);
    assert_eq!(cooked.len(), 1);
    assert_eq!(cooked[0].kind, AssetEventKind::Cook);
    assert_eq!(session.cook_call_count(), cooks + 1);
    assert_eq!(
        session.object_transform(node).expect("transform"),
        Transform::IDENTITY
    );
}

#[test]
fn fatal_cook_is_kept_when_another_asset_cooks_meanwhile() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut first = tower_controller();
    let first_events = loaded(&mut first, &mut session);
    let mut second = tower_controller();
    let second_events = loaded(&mut second, &mut session);
    let first_outputs = first.outputs();
    session.fail_next_cook("license missing");

    // --- 2. ACT ---
    first.request_cook(CookOptions::default());
    first.update(&mut session);
    assert_eq!(first.status(), CookStatus::Cooking);
    second.request_cook(CookOptions::default());
    second.update(&mut session);
    for _ in 0..3 {
        first.update(&mut session);
        second.update(&mut session);
    }

    // --- 3. ASSERT ---
    let first_cooked = drain(&first_events);
    assert_eq!(first_cooked.len(), 1);
    assert!(!first_cooked[0].success);
    assert_eq!(first.last_result(), CookResult::Errored);
    assert_eq!(first.outputs(), first_outputs);

    let second_cooked = drain(&second_events);
    assert_eq!(second_cooked.len(), 1);
    assert!(second_cooked[0].success);
    assert_eq!(second.last_result(), CookResult::Success);
}

#[test]
fn refused_cook_settles_at_none_with_an_error() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);
    let outputs_before = object_names(&controller);
    controller.config_mut().cooking_enabled = false;

    // --- 2. ACT ---
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 1);

    // --- 3. ASSERT ---
    // Settled within the same tick, without a PostCook step.
    assert_eq!(controller.status(), CookStatus::None);
    assert_eq!(controller.last_result(), CookResult::Errored);
    let failed = drain(&events);
    assert_eq!(failed.len(), 1);
    assert!(!failed[0].success);
    assert_eq!(object_names(&controller), outputs_before);
}

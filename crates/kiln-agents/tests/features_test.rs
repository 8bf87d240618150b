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
use kiln_agents::{AssetController, ControllerConfig, ControllerError, RequestOutcome};
use kiln_core::session::{InputConnection, ParmValue, Session};
use kiln_core::{
    AssetEventKind, AssetKey, AssetKind, AssetSource, BuildAction, CookOptions, CookStatus,
    CreationMode,
};
use kiln_data::InputKind;

fn inline_controller(kind: AssetKind) -> AssetController {
    AssetController::new(
        kind,
        AssetSource::inline(),
        ControllerConfig::default(),
        CreationMode::Fresh,
    )
}

fn curve_value(controller: &AssetController, curve: &str, parameter: &str) -> Option<ParmValue> {
    controller
        .graph()
        .curves()
        .find(|(_, c)| c.name == curve)
        .and_then(|(_, c)| c.parameters.get(parameter).cloned())
}

#[test]
fn library_with_several_definitions_waits_for_a_choice() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = controller_for(MULTI_PATH);
    let events = controller.subscribe();

    // --- 2. ACT ---
    controller.request_reload();
    tick(&mut controller, &mut session, 3);

    // --- 3. ASSERT ---
    assert_eq!(controller.status(), CookStatus::SelectSubasset);
    assert_eq!(controller.subasset_names(), &["kiln::obelisk", "kiln::spire"]);
    assert!(drain(&events).is_empty(), "a parked rebuild reports nothing");
    assert!(!controller.is_idle());

    assert!(matches!(
        controller.select_subasset(7),
        Err(ControllerError::InvalidSubasset(7))
    ));
    controller.select_subasset(1).expect("valid choice");
    controller.update(&mut session);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(events[0].success);
    assert_eq!(controller.operator_name(), "kiln::spire");
    assert_eq!(controller.graph().object_names(), vec!["spire"]);

    // The choice sticks for later rebuilds.
    controller.request_reload();
    tick(&mut controller, &mut session, 2);
    assert_eq!(controller.operator_name(), "kiln::spire");
    assert_eq!(controller.status(), CookStatus::None);
}

#[test]
fn bake_keeps_outputs_and_drops_the_session_node() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    // --- 2. ACT ---
    assert_eq!(controller.request_bake_in_place(), RequestOutcome::Queued);
    controller.update(&mut session);

    // --- 3. ASSERT ---
    let baked = drain(&events);
    assert_eq!(baked.len(), 1);
    assert_eq!(baked[0].kind, AssetEventKind::Bake);
    assert!(baked[0].success);
    assert_eq!(baked[0].outputs.len(), 2);
    assert!(controller.is_baked());
    assert_eq!(controller.node(), None);
    assert_eq!(session.node_count(), 0);
    assert_eq!(controller.outputs().len(), 2);

    // Nothing runs on a baked asset any more.
    controller.request_cook(CookOptions::default());
    controller.update(&mut session);
    controller.reload_blocking(&mut session);
    let refused = drain(&events);
    assert_eq!(refused.len(), 2);
    assert!(refused.iter().all(|e| !e.success));
    assert_eq!(session.node_count(), 0);
}

#[test]
fn pending_bake_absorbs_a_reload() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    controller.request_bake_in_place();
    assert_eq!(
        controller.request_reload(),
        RequestOutcome::Absorbed(BuildAction::StripEngineData)
    );
    controller.update(&mut session);

    let kinds: Vec<(AssetEventKind, bool)> =
        drain(&events).iter().map(|e| (e.kind, e.success)).collect();
    assert_eq!(
        kinds,
        vec![(AssetEventKind::Bake, true), (AssetEventKind::Reload, true)]
    );
    assert!(controller.is_baked());
}

#[test]
fn input_fed_by_another_asset_is_connected_and_follows_it() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut upstream = tower_controller();
    let _upstream_events = loaded(&mut upstream, &mut session);
    let mut downstream = tower_controller();
    let events = loaded(&mut downstream, &mut session);

    // --- 2. ACT ---
    assert!(downstream.set_input_connection("ground", InputConnection::asset(upstream.key())));
    assert!(!downstream.set_input_connection("sky", InputConnection::default()));
    assert!(downstream.requires_recook());
    downstream.request_cook(CookOptions::default());
    tick(&mut downstream, &mut session, 2);

    // --- 3. ASSERT ---
    let node = downstream.node().expect("node created");
    assert_eq!(
        session.input_connections(node).get(&0),
        Some(&InputConnection::asset(upstream.key()))
    );
    assert_eq!(downstream.inputs()[0].upstream_asset(), Some(upstream.key()));
    assert!(!downstream.inputs()[0].requires_upload);
    drain(&events);

    assert!(!downstream.notify_upstream_cooked(AssetKey::new()));
    assert_eq!(downstream.pending_action(), BuildAction::None);
    assert!(downstream.notify_upstream_cooked(upstream.key()));
    assert_eq!(downstream.pending_action(), BuildAction::Cook);

    tick(&mut downstream, &mut session, 2);
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
}

#[test]
fn refused_connection_stays_dirty_without_failing_the_cook() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let events = loaded(&mut controller, &mut session);

    // The session only accepts assets it knows about.
    controller.set_input_connection("ground", InputConnection::asset(AssetKey::new()));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert!(controller.inputs()[0].requires_upload);
}

#[test]
fn parameter_input_travels_with_the_parameters() {
    let mut session = fixture_session();
    let mut controller = tower_controller();
    let _events = loaded(&mut controller, &mut session);

    assert!(controller.attach_parameter_input("label"));
    assert!(!controller.attach_parameter_input("label"));
    assert!(controller.set_input_connection("label", InputConnection::geometry("plane")));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let node = controller.node().expect("node created");
    assert_eq!(
        session.parameter_values(node).expect("values").get("label"),
        Some(&ParmValue::Text("plane".to_string()))
    );
    assert_eq!(controller.graph().object_names(), vec!["plane_0", "plane_1"]);

    controller.request_reload();
    controller.update(&mut session);
    let label = controller
        .inputs()
        .iter()
        .find(|i| i.name == "label")
        .expect("parameter input survives rebuilds");
    assert_eq!(label.kind, InputKind::Parameter);
    assert_eq!(label.connection, InputConnection::geometry("plane"));
    assert_eq!(controller.inputs().len(), 2);
}

#[test]
fn curve_edits_are_uploaded_and_survive_a_reload() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = controller_for(ROAD_PATH);
    let _events = loaded(&mut controller, &mut session);
    let edited = ParmValue::Text("0,0 1,0 2,0".to_string());

    // --- 2. ACT ---
    assert!(controller.set_curve_parameter("path", "coords", edited.clone()));
    assert!(!controller.set_curve_parameter("missing", "coords", edited.clone()));
    assert!(controller.requires_recook());
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    // --- 3. ASSERT ---
    let geo = controller
        .graph()
        .geo_by_name("road", "path")
        .and_then(|key| controller.graph().geo(key))
        .map(|geo| geo.node)
        .expect("curve geo");
    assert_eq!(
        session.parameter_values(geo).expect("values").get("coords"),
        Some(&edited)
    );
    assert_eq!(curve_value(&controller, "path", "coords"), Some(edited.clone()));

    controller.request_reload();
    controller.update(&mut session);
    assert_eq!(curve_value(&controller, "path", "coords"), Some(edited));
}

#[test]
fn curve_asset_cooks_its_own_points() {
    let mut session = fixture_session();
    let mut controller = inline_controller(AssetKind::Curve);
    let events = loaded(&mut controller, &mut session);
    assert_eq!(controller.asset_name(), "curve");

    assert!(controller.set_curve_parameter(
        "curve",
        "coords",
        ParmValue::Text("0,0 1,1 2,2".to_string())
    ));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outputs.len(), 1);
    assert_eq!(events[0].outputs[0].point_count, 3);
}

#[test]
fn input_only_asset_needs_no_library() {
    let mut session = fixture_session();
    let mut controller = inline_controller(AssetKind::InputOnly);
    let _events = loaded(&mut controller, &mut session);

    assert_eq!(controller.operator_name(), kiln_infra::INPUT_OPERATOR);
    assert_eq!(session.library_load_count(), 0);
    assert_eq!(controller.outputs().len(), 1);
}

#[test]
fn painted_attributes_reach_the_session() {
    let mut session = fixture_session();
    let mut controller = controller_for(CANVAS_PATH);
    let _events = loaded(&mut controller, &mut session);

    assert!(controller.set_attribute("canvas", "paint", "mask", vec![0.5, 1.0]));
    assert!(!controller.set_attribute("canvas", "missing", "mask", vec![0.5]));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, &mut session, 2);

    let geo = controller
        .graph()
        .geo_by_name("canvas", "paint")
        .and_then(|key| controller.graph().geo(key))
        .map(|geo| geo.node)
        .expect("editable geo");
    assert_eq!(session.attribute_values(geo, "mask"), Some(vec![0.5, 1.0]));
}

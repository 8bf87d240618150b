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
use kiln_agents::{AssetController, ControllerConfig};
use kiln_core::event::Diagnostic;
use kiln_core::preset::VolumeTileSettings;
use kiln_core::session::{InputConnection, ParmValue};
use kiln_core::{AssetEventKind, AssetKind, AssetSource, BuildAction, CookOptions, CreationMode};
use kiln_infra::MemorySession;
use kiln_lanes::preset_lane;

fn grass() -> VolumeTileSettings {
    VolumeTileSettings {
        material: Some("grass".to_string()),
        detail_density: 0.25,
        visible: false,
    }
}

fn tile_settings(controller: &AssetController, tile: u32) -> Option<VolumeTileSettings> {
    controller
        .graph()
        .volumes()
        .find(|(_, v)| v.object_name == "land" && v.geo_name == "height" && v.tile == tile)
        .map(|(_, v)| v.settings.clone())
}

/// A tower cooked with three floors, a taller height and a connected input.
fn edited_tower(session: &mut MemorySession) -> AssetController {
    let mut controller = tower_controller();
    let _events = loaded(&mut controller, session);
    controller.set_parameter("floors", ParmValue::Int(3));
    controller.set_parameter("height", ParmValue::Float(7.5));
    controller.request_cook(CookOptions::default());
    tick(&mut controller, session, 2);
    assert!(controller.set_input_connection("ground", InputConnection::geometry("plane")));
    controller
}

#[test]
fn preset_restores_state_on_another_controller() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let source = edited_tower(&mut session);
    let bytes = preset_lane::encode(&source.capture_preset()).expect("preset encodes");

    let mut target = tower_controller();
    let events = loaded(&mut target, &mut session);

    // --- 2. ACT ---
    let preset = preset_lane::decode(&bytes).expect("preset decodes");
    target.load_preset_and_cook(&mut session, &preset);

    // --- 3. ASSERT ---
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Cook);
    assert!(events[0].success);
    assert_eq!(events[0].outputs.len(), 3);

    assert_eq!(target.parameters().get("floors"), Some(&ParmValue::Int(3)));
    assert_eq!(target.parameters().get("height"), Some(&ParmValue::Float(7.5)));
    let node = target.node().expect("node created");
    assert_eq!(
        session.input_connections(node).get(&0),
        Some(&InputConnection::geometry("plane"))
    );
}

#[test]
fn edits_survive_a_reload() {
    let mut session = fixture_session();
    let mut controller = edited_tower(&mut session);
    let events = controller.subscribe();

    controller.request_reload();
    tick(&mut controller, &mut session, 2);

    let events = drain(&events);
    assert_eq!(events.len(), 1, "the preset recook is part of the rebuild");
    assert!(events[0].success);
    assert_eq!(controller.parameters().get("floors"), Some(&ParmValue::Int(3)));
    assert_eq!(controller.graph().object_count(), 3);
    assert_eq!(
        controller.inputs()[0].connection,
        InputConnection::geometry("plane")
    );
}

#[test]
fn duplicate_starts_from_the_source_state() {
    let mut session = fixture_session();
    let source = edited_tower(&mut session);

    let mut copy = AssetController::new(
        AssetKind::Definition,
        AssetSource::from_path(TOWERS_PATH),
        ControllerConfig::default(),
        CreationMode::Duplicate(source.capture_preset()),
    );
    assert!(copy.saved_preset().is_some());
    let events = loaded(&mut copy, &mut session);

    assert!(drain(&events).is_empty());
    assert_ne!(copy.key(), source.key());
    assert_ne!(copy.node(), source.node());
    assert_eq!(copy.parameters().get("floors"), Some(&ParmValue::Int(3)));
    assert_eq!(copy.graph().object_count(), 3);
}

#[test]
fn restored_asset_rebuilds_without_a_request() {
    let mut session = fixture_session();
    let mut controller = AssetController::new(
        AssetKind::Definition,
        AssetSource::from_path(TOWERS_PATH),
        ControllerConfig::default(),
        CreationMode::Restored,
    );
    let events = controller.subscribe();
    assert!(!controller.is_idle());

    controller.update(&mut session);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(events[0].success);
    assert!(controller.node().is_some());
    assert!(controller.is_idle());
}

#[test]
fn queued_reset_goes_back_to_defaults_through_a_rebuild() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut controller = edited_tower(&mut session);
    let events = controller.subscribe();

    // --- 2. ACT ---
    controller.request_reset_parameters();
    controller.update(&mut session);

    // --- 3. ASSERT ---
    // The reset itself hands over to a rebuild on the next tick.
    assert_eq!(controller.pending_action(), BuildAction::Reload);
    assert!(drain(&events).is_empty());

    controller.update(&mut session);
    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(events[0].success);
    assert_eq!(controller.parameters().get("floors"), Some(&ParmValue::Int(2)));
    assert_eq!(controller.parameters().get("height"), Some(&ParmValue::Float(2.0)));
    assert_eq!(controller.inputs()[0].connection, InputConnection::default());
    assert_eq!(controller.graph().object_count(), 2);
}

#[test]
fn blocking_reset_reports_one_reload() {
    let mut session = fixture_session();
    let mut controller = edited_tower(&mut session);
    let events = controller.subscribe();

    controller.reset_parameters_blocking(&mut session);

    let events = drain(&events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AssetEventKind::Reload);
    assert!(events[0].success);
    assert_eq!(controller.parameters().get("floors"), Some(&ParmValue::Int(2)));
}

#[test]
fn volume_tile_settings_survive_a_reload() {
    let mut session = fixture_session();
    let mut controller = controller_for(TERRAIN_PATH);
    let _events = loaded(&mut controller, &mut session);

    assert!(controller.set_volume_tile_settings("land", "height", 0, grass()));
    assert!(!controller.set_volume_tile_settings("land", "height", 9, grass()));
    assert!(controller.requires_recook());

    controller.request_reload();
    controller.update(&mut session);

    assert_eq!(tile_settings(&controller, 0), Some(grass()));
    assert!(controller.graph().volumes().all(|(_, v)| !v.dirty));
}

#[test]
fn preset_for_tiles_that_do_not_exist_yet_is_applied_after_the_next_cook() {
    // --- 1. ARRANGE ---
    let mut session = fixture_session();
    let mut source = controller_for(TERRAIN_PATH);
    let _source_events = loaded(&mut source, &mut session);
    source.set_parameter("tiles", ParmValue::Int(3));
    source.request_cook(CookOptions::default());
    tick(&mut source, &mut session, 2);
    assert!(source.set_volume_tile_settings("land", "height", 2, grass()));

    let mut copy = AssetController::new(
        AssetKind::Definition,
        AssetSource::from_path(TERRAIN_PATH),
        ControllerConfig::default(),
        CreationMode::Duplicate(source.capture_preset()),
    );
    let events = copy.subscribe();

    // --- 2. ACT ---
    copy.request_reload();
    copy.update(&mut session);

    // --- 3. ASSERT ---
    let rebuilt = drain(&events);
    assert_eq!(rebuilt.len(), 1);
    assert!(rebuilt[0].success);
    assert!(rebuilt[0].diagnostics.contains(&Diagnostic::PresetApplyMiss {
        target: "volume tile land/height#2".to_string(),
        deferred: true,
    }));
    assert_eq!(tile_settings(&copy, 2), Some(grass()));
    assert_eq!(
        copy.pending_action(),
        BuildAction::Cook,
        "applying the deferred preset queues a cook"
    );

    tick(&mut copy, &mut session, 2);
    let followed = drain(&events);
    assert_eq!(followed.len(), 1);
    assert_eq!(followed[0].kind, AssetEventKind::Cook);
    assert!(followed[0].success);
    assert!(copy.recook_preset().is_empty());
    assert_eq!(tile_settings(&copy, 2), Some(grass()));
}

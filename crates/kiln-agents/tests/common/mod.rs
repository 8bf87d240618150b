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

//! Fixtures shared by the controller tests.

#![allow(dead_code)]

use kiln_agents::{AssetController, ControllerConfig};
use kiln_core::session::{
    GeoKind, HandleInfo, MaterialId, MaterialInfo, ParmValue, ParmValues,
};
use kiln_core::{AssetEvent, AssetKind, AssetSource, CreationMode};
use kiln_infra::{Definition, GeoTemplate, Library, MemorySession, ObjectTemplate, PartTemplate};

pub const TOWER: &str = "kiln::tower";
pub const TOWERS_PATH: &str = "towers.ron";
pub const MULTI_PATH: &str = "multi.ron";
pub const TERRAIN_PATH: &str = "terrain.ron";
pub const CANVAS_PATH: &str = "canvas.ron";
pub const ROAD_PATH: &str = "road.ron";

fn parms(values: &[(&str, ParmValue)]) -> ParmValues {
    values
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn int_parm(parameters: &ParmValues, name: &str) -> i32 {
    match parameters.get(name) {
        Some(ParmValue::Int(value)) => *value,
        _ => 0,
    }
}

/// `floors` objects named `<label>_<i>`, each with one stone part.
pub fn tower_floors(parameters: &ParmValues) -> Vec<ObjectTemplate> {
    let label = match parameters.get("label") {
        Some(ParmValue::Text(label)) => label.clone(),
        _ => "tower".to_string(),
    };
    (0..int_parm(parameters, "floors").max(0))
        .map(|i| {
            let mut object = ObjectTemplate::single_part(&format!("{label}_{i}"), 4);
            object.geos[0].parts[0].material = Some(1);
            object
        })
        .collect()
}

/// One heightfield with `tiles` tiles.
pub fn terrain_tiles(parameters: &ParmValues) -> Vec<ObjectTemplate> {
    let tiles = int_parm(parameters, "tiles").max(0) as u32;
    vec![ObjectTemplate {
        name: "land".to_string(),
        transform: Default::default(),
        instanced_objects: Vec::new(),
        geos: vec![GeoTemplate {
            name: "height".to_string(),
            kind: GeoKind::Heightfield { tiles },
            parameters: ParmValues::new(),
            parts: vec![PartTemplate {
                name: "surface".to_string(),
                material: None,
                point_count: tiles * 16,
            }],
        }],
    }]
}

pub fn tower_definition() -> Definition {
    let mut tower = Definition::new(
        TOWER,
        parms(&[
            ("height", ParmValue::Float(2.0)),
            ("floors", ParmValue::Int(2)),
            ("label", ParmValue::Text("tower".to_string())),
        ]),
        Vec::new(),
    );
    tower.inputs = vec!["ground".to_string()];
    tower.handles = vec![HandleInfo {
        name: "base".to_string(),
        kind: "xform".to_string(),
        bound_parameters: vec!["height".to_string()],
    }];
    tower.materials = vec![MaterialInfo {
        id: MaterialId(1),
        name: "stone".to_string(),
        texture: Some("stone.png".to_string()),
    }];
    tower
}

pub fn towers_library() -> Library {
    Library {
        name: "towers".to_string(),
        definitions: vec![tower_definition()],
    }
}

fn single_geo_definition(operator: &str, object: &str, geo: &str, kind: GeoKind, parameters: ParmValues) -> Definition {
    Definition::new(
        operator,
        ParmValues::new(),
        vec![ObjectTemplate {
            name: object.to_string(),
            transform: Default::default(),
            instanced_objects: Vec::new(),
            geos: vec![GeoTemplate {
                name: geo.to_string(),
                kind,
                parameters,
                parts: vec![PartTemplate {
                    name: geo.to_string(),
                    material: None,
                    point_count: 2,
                }],
            }],
        }],
    )
}

/// A session with every fixture library installed.
pub fn fixture_session() -> MemorySession {
    let mut session = MemorySession::new();
    session.install_library(TOWERS_PATH, towers_library());
    session.set_object_generator(TOWER, tower_floors);

    session.install_library(
        MULTI_PATH,
        Library {
            name: "monuments".to_string(),
            definitions: vec![
                Definition::new("kiln::obelisk", ParmValues::new(), vec![ObjectTemplate::single_part("obelisk", 5)]),
                Definition::new("kiln::spire", ParmValues::new(), vec![ObjectTemplate::single_part("spire", 6)]),
            ],
        },
    );

    session.install_library(
        TERRAIN_PATH,
        Library {
            name: "terrain".to_string(),
            definitions: vec![Definition::new(
                "kiln::terrain",
                parms(&[("tiles", ParmValue::Int(1))]),
                Vec::new(),
            )],
        },
    );
    session.set_object_generator("kiln::terrain", terrain_tiles);

    session.install_library(
        CANVAS_PATH,
        Library {
            name: "canvas".to_string(),
            definitions: vec![single_geo_definition(
                "kiln::canvas",
                "canvas",
                "paint",
                GeoKind::Editable,
                ParmValues::new(),
            )],
        },
    );

    session.install_library(
        ROAD_PATH,
        Library {
            name: "roads".to_string(),
            definitions: vec![single_geo_definition(
                "kiln::road",
                "road",
                "path",
                GeoKind::Curve,
                parms(&[
                    ("coords", ParmValue::Text("0,0 1,0".to_string())),
                    ("closed", ParmValue::Toggle(false)),
                ]),
            )],
        },
    );
    session
}

pub fn controller_for(path: &str) -> AssetController {
    AssetController::new(
        AssetKind::Definition,
        AssetSource::from_path(path),
        ControllerConfig::default(),
        CreationMode::Fresh,
    )
}

pub fn tower_controller() -> AssetController {
    controller_for(TOWERS_PATH)
}

/// Runs the first rebuild of `controller` and discards its event.
pub fn loaded(controller: &mut AssetController, session: &mut MemorySession) -> flume::Receiver<AssetEvent> {
    let events = controller.subscribe();
    controller.request_reload();
    controller.update(session);
    let first: Vec<AssetEvent> = events.try_iter().collect();
    assert_eq!(first.len(), 1, "the first rebuild reports once");
    assert!(first[0].success, "the first rebuild succeeds");
    events
}

/// Ticks `controller` a fixed number of times.
pub fn tick(controller: &mut AssetController, session: &mut MemorySession, ticks: usize) {
    for _ in 0..ticks {
        controller.update(session);
    }
}

pub fn drain(events: &flume::Receiver<AssetEvent>) -> Vec<AssetEvent> {
    events.try_iter().collect()
}

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

//! JSON summary of a run.

use kiln_control::{AssetUpdater, IdleReport};
use kiln_core::{AssetKey, CookResult, CookStatus, OutputRef};
use serde::Serialize;

/// One asset's final state.
#[derive(Debug, Serialize)]
pub struct AssetReport {
    pub asset: AssetKey,
    pub operator: String,
    pub name: String,
    pub status: CookStatus,
    pub result: CookResult,
    pub cook_count: u32,
    pub outputs: Vec<OutputRef>,
    pub diagnostics: Vec<String>,
}

/// What gets printed.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub ticks: usize,
    pub idle: bool,
    pub assets: Vec<AssetReport>,
}

impl RunReport {
    /// Gathers every controller's state and the diagnostics it reported.
    pub fn collect(updater: &AssetUpdater, outcome: &IdleReport) -> Self {
        let assets = updater
            .iter()
            .map(|controller| {
                let key = controller.key();
                let diagnostics = outcome
                    .events
                    .iter()
                    .filter(|e| e.asset == key)
                    .flat_map(|e| e.diagnostics.iter().map(ToString::to_string))
                    .collect();
                AssetReport {
                    asset: key,
                    operator: controller.operator_name().to_string(),
                    name: controller.asset_name().to_string(),
                    status: controller.status(),
                    result: controller.last_result(),
                    cook_count: controller.total_cook_count(),
                    outputs: controller.outputs(),
                    diagnostics,
                }
            })
            .collect();

        Self {
            ticks: outcome.ticks,
            idle: outcome.idle,
            assets,
        }
    }

    /// Number of assets whose last sequence did not succeed.
    pub fn failures(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| a.result != CookResult::Success)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_agents::{AssetController, ControllerConfig};
    use kiln_core::session::ParmValues;
    use kiln_core::{AssetKind, AssetSource, CreationMode};
    use kiln_infra::{Definition, Library, MemorySession, ObjectTemplate};

    fn garden_session() -> MemorySession {
        let mut session = MemorySession::new();
        session.install_library(
            "garden.ron",
            Library {
                name: "garden".to_string(),
                definitions: vec![
                    Definition::new("kiln::hedge", ParmValues::new(), vec![ObjectTemplate::single_part("hedge", 12)]),
                    Definition::new("kiln::pond", ParmValues::new(), vec![ObjectTemplate::single_part("pond", 7)]),
                ],
            },
        );
        session
    }

    fn run(path: &str) -> RunReport {
        let mut session = garden_session();
        let mut updater = AssetUpdater::new();
        for index in 0..2 {
            let mut controller = AssetController::new(
                AssetKind::Definition,
                AssetSource::from_path(path),
                ControllerConfig::default(),
                CreationMode::Fresh,
            );
            controller.select_subasset(index).unwrap();
            controller.request_reload();
            updater.add(controller);
        }
        let outcome = updater.run_until_idle(&mut session, 8);
        RunReport::collect(&updater, &outcome)
    }

    #[test]
    fn every_definition_is_reported() {
        let report = run("garden.ron");

        assert!(report.idle);
        assert_eq!(report.failures(), 0);
        let operators: Vec<&str> = report.assets.iter().map(|a| a.operator.as_str()).collect();
        assert_eq!(operators, vec!["kiln::hedge", "kiln::pond"]);
        assert_eq!(report.assets[1].outputs[0].object, "pond");
        assert_eq!(report.assets[1].outputs[0].point_count, 7);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["assets"][0]["result"], "Success");
        assert_eq!(json["assets"][0]["outputs"][0]["point_count"], 12);
    }

    #[test]
    fn missing_library_counts_as_failure() {
        let report = run("nowhere.ron");

        assert!(report.idle);
        assert_eq!(report.failures(), 2);
        assert!(report.assets.iter().all(|a| a.outputs.is_empty()));
    }
}

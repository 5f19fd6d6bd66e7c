use admitflow_core::{AdmissionBuffer, AdmissionError, TimedEvent};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[allow(dead_code)]
    description: String,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    batch: Vec<TimedEvent>,
    #[serde(default)]
    expect_invalid: bool,
    expected_admitted: Vec<String>,
    expected_watermark: Option<DateTime<Utc>>,
}

fn scenarios_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures/scenarios")
}

fn load_scenarios() -> Vec<Scenario> {
    let dir = scenarios_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("failed to read {dir:?}: {e}"))
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let content = fs::read_to_string(path).unwrap_or_else(|e| {
                panic!("failed to read scenario {path:?}: {e}");
            });
            serde_json::from_str(&content).unwrap_or_else(|e| {
                panic!("failed to parse scenario {path:?}: {e}");
            })
        })
        .collect()
}

fn run_scenario(scenario: &Scenario) {
    let mut buf = AdmissionBuffer::new();

    for (i, step) in scenario.steps.iter().enumerate() {
        let result = buf.admit(step.batch.clone());

        if step.expect_invalid {
            assert!(
                matches!(result, Err(AdmissionError::InvalidInput(_))),
                "[{}] step {i}: expected InvalidInput, got {result:?}",
                scenario.name
            );
        } else {
            let admitted = result.unwrap_or_else(|e| {
                panic!("[{}] step {i}: unexpected error {e}", scenario.name);
            });
            let ids: Vec<&str> = admitted.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(
                ids, step.expected_admitted,
                "[{}] step {i}: admitted ids",
                scenario.name
            );
        }

        assert_eq!(
            buf.watermark(),
            step.expected_watermark.as_ref(),
            "[{}] step {i}: watermark",
            scenario.name
        );
    }
}

#[test]
fn replay_all_scenarios() {
    let scenarios = load_scenarios();
    assert!(
        scenarios.len() >= 6,
        "expected scenario fixtures in {:?}",
        scenarios_dir()
    );
    for scenario in &scenarios {
        run_scenario(scenario);
    }
}

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA: &str = include_str!("../../../schema/schema.yaml");

fn claims_csv(n: usize, skip: Option<&str>) -> String {
    let header = [
        "id",
        "age",
        "gender",
        "driving_experience",
        "education",
        "income",
        "credit_score",
        "vehicle_ownership",
        "vehicle_year",
        "married",
        "children",
        "postal_code",
        "annual_mileage",
        "speeding_violations",
        "past_accidents",
        "outcome",
    ];
    let keep: Vec<usize> = (0..header.len()).filter(|&c| Some(header[c]) != skip).collect();
    let mut out = keep.iter().map(|&c| header[c]).collect::<Vec<_>>().join(",");
    out.push('\n');
    for i in 0..n {
        let speeding = i % 5;
        let accidents = (i * 7) % 4;
        let outcome = u8::from(accidents >= 2 || speeding >= 4);
        let row = [
            i.to_string(),
            ["16-25", "26-39", "40-64", "65+"][i % 4].to_string(),
            ["female", "male"][i % 2].to_string(),
            ["0-9y", "10-19y", "20-29y", "30y+"][(i / 2) % 4].to_string(),
            ["none", "high school", "university"][i % 3].to_string(),
            ["poverty", "working class", "middle class", "upper class"][(i / 3) % 4].to_string(),
            format!("{:.1}", (i % 10) as f64 / 10.0),
            (i % 2).to_string(),
            ["before 2015", "after 2015"][(i / 5) % 2].to_string(),
            ((i / 7) % 2).to_string(),
            (i % 3).to_string(),
            "10238".to_string(),
            (10_000 + (i % 6) * 1000).to_string(),
            speeding.to_string(),
            accidents.to_string(),
            outcome.to_string(),
        ];
        let fields: Vec<&str> = keep.iter().map(|&c| row[c].as_str()).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(csv: Option<&str>) -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("schema.yaml"), SCHEMA).unwrap();
        let dataset = csv.map(|csv| {
            let dir = temp.path().join("data");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("claims.csv"), csv).unwrap();
            format!("dataset_url = '{}'\n", dir.display())
        });

        let config = format!(
            r"
artifact_root = '{root}'
schema_path = '{schema}'
random_seed = 11

[ingestion]
{dataset}collection = 'claims'

[trainer]
expected_score = 0.0

[[trainer.candidates]]
name = 'forest'
family = 'random_forest'
grid = {{ n_estimators = [10], max_depth = [4] }}

[registry]
root = '{registry}'
",
            root = temp.path().join("artifacts").display(),
            schema = temp.path().join("schema.yaml").display(),
            dataset = dataset.unwrap_or_default(),
            registry = temp.path().join("registry").display(),
        );
        std::fs::write(temp.path().join("claimguard.toml"), config).unwrap();
        Self { temp }
    }

    fn config_path(&self) -> PathBuf {
        self.temp.path().join("claimguard.toml")
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("claimguard-cli").unwrap();
        cmd.env_remove("CLAIMGUARD_DATASET_URL")
            .env_remove("CLAIMGUARD_REGISTRY_ROOT")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("claimguard-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("predict"))
        .stdout(predicate::str::contains("champion"));
}

#[test]
fn test_train_without_dataset_fails() {
    let ws = Workspace::new(None);
    ws.cmd()
        .arg("train")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no dataset location"));
}

#[test]
fn test_champion_reports_empty_registry() {
    let ws = Workspace::new(None);
    let output = ws.cmd().args(["champion", "--json"]).output().unwrap();
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["present"], false);
    assert_eq!(info["key"], "claimguard-models/model.json");
}

#[test]
fn test_train_then_predict() {
    let ws = Workspace::new(Some(&claims_csv(60, None)));

    let output = ws.cmd().args(["train", "--json"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["evaluation"]["accepted"], true);
    assert_eq!(summary["pusher"]["pushed"], true);
    assert!(ws.path().join("registry").join("claimguard-models").join("model.json").exists());

    let output = ws.cmd().args(["champion", "--json"]).output().unwrap();
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["present"], true);
    assert_eq!(info["model_name"], summary["model_name"]);

    let record = serde_json::json!({
        "driving_experience": "0-9y",
        "education": "high school",
        "income": "poverty",
        "vehicle_year": "before 2015",
        "credit_score": 0.3,
        "annual_mileage": 12000.0,
        "age": "16-25",
        "gender": "male",
        "vehicle_ownership": 0.0,
        "married": 0.0,
        "children": 1.0,
        "speeding_violations": 4.0,
        "past_accidents": 3.0,
    });
    let record_path = ws.path().join("record.json");
    std::fs::write(&record_path, record.to_string()).unwrap();

    let output = ws.cmd().arg("predict").arg(&record_path).arg("--json").output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let prediction: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let label = prediction["prediction"].as_str().unwrap();
    assert!(label == "claim" || label == "no_claim");
    let probability = prediction["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
}

#[test]
fn test_predict_rejects_malformed_record() {
    let ws = Workspace::new(None);
    let record_path = ws.path().join("record.json");
    std::fs::write(&record_path, "{}").unwrap();
    ws.cmd().arg("predict").arg(&record_path).assert().code(1).stderr(predicate::str::contains("parsing record"));
}

#[test]
fn test_validation_failure_exits_with_two() {
    let ws = Workspace::new(Some(&claims_csv(60, Some("income"))));
    ws.cmd()
        .arg("train")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("income"));
}

//! Integration tests for the brewday CLI
//!
//! Every test runs against a SQLite database in its own temporary data
//! directory, so state carries over between invocations like on a real
//! brew day.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const RECIPE: &str = r#"{
    "name": "Citra Pale Ale",
    "style": "American Pale Ale",
    "batch_size": 20.0,
    "initial_sg": 1.052,
    "mashing": {
        "malts": [{"name": "Pale Ale Malt", "amount": 4500.0}],
        "main_water_volume": 16.0,
        "nachguss": 12.0,
        "mash_temperature": 67.0,
        "mash_out_temperature": 78.0,
        "rasts": [{"temperature": 67.0, "duration": 60.0}]
    },
    "hopping": {
        "total_cooking_time": 60.0,
        "hops": [
            {"name": "Magnum", "alpha": 13.0, "amount": 15.0, "duration": 60.0},
            {"name": "Citra", "alpha": 12.0, "amount": 50.0, "duration": 4.0, "dry_hop": true},
            {"name": "Citra", "alpha": 12.0, "amount": 30.0, "duration": 2.0, "dry_hop": true}
        ]
    },
    "fermentation": {
        "yeast": {"name": "US-05", "amount": 11.5},
        "temperature": "18-20",
        "carbonation": 5.0
    }
}"#;

/// Helper to create a brewday Command bound to a data directory
fn brewday(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("brewday");
    cmd.current_dir(dir.path())
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--store")
        .arg("sqlite")
        .env_remove("RUST_LOG")
        .env_remove("BREWDAY_DATA_DIR")
        .env_remove("BREWDAY_STORE")
        .env_remove("BREWDAY_GOTIFY_URL")
        .env_remove("BREWDAY_GOTIFY_USER")
        .env_remove("BREWDAY_GOTIFY_PASSWORD")
        .env_remove("BREWDAY_LOG");
    cmd
}

/// Stores the test recipe and returns its id
fn add_recipe(dir: &TempDir) -> String {
    let path = dir.path().join("recipe.json");
    fs::write(&path, RECIPE).unwrap();
    let output = brewday(dir)
        .args(["recipe", "add"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_brewday_help() {
        cargo_bin_cmd!("brewday").arg("--help").assert().success();
    }

    #[test]
    fn test_brewday_version() {
        cargo_bin_cmd!("brewday").arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_store_is_rejected() {
        let dir = TempDir::new().unwrap();
        cargo_bin_cmd!("brewday")
            .args(["--store", "redis", "recipe", "list"])
            .current_dir(dir.path())
            .assert()
            .failure();
    }
}

mod recipes {
    use super::*;

    #[test]
    fn test_add_list_and_show() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        assert_eq!(id, "1");
        assert!(dir.path().join("brewday.db").exists());

        brewday(&dir)
            .args(["recipe", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1\tCitra Pale Ale\tcreated"));

        brewday(&dir)
            .args(["recipe", "show", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"style\": \"American Pale Ale\""));
    }

    #[test]
    fn test_show_unknown_recipe_fails() {
        let dir = TempDir::new().unwrap();
        brewday(&dir)
            .args(["recipe", "show", "42"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No recipe found for recipe 42"));
    }

    #[test]
    fn test_status_round_trip() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);

        brewday(&dir)
            .args(["status", "set", &id, "mashing", "rast", "1"])
            .assert()
            .success();
        brewday(&dir)
            .args(["status", "get", &id])
            .assert()
            .success()
            .stdout("mashing rast 1\n");

        brewday(&dir)
            .args(["status", "set", &id, "bogus"])
            .assert()
            .failure();
    }

    #[test]
    fn test_delete_recipe() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir).args(["recipe", "delete", &id]).assert().success();
        brewday(&dir)
            .args(["timeline", "show", &id])
            .assert()
            .failure();
        brewday(&dir)
            .args(["recipe", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No recipes stored."));
    }
}

mod timers {
    use super::*;

    #[test]
    fn test_second_start_returns_first_end() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);

        let first = stdout_of(brewday(&dir).args(["timer", "start", &id, "mash", "--minutes", "10"]));
        let second = stdout_of(brewday(&dir).args(["timer", "start", &id, "mash", "--minutes", "60"]));
        assert!(first.starts_with("{\"end_timestamp\":"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_duration_uses_first_stop() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);

        let started = stdout_of(brewday(&dir).args([
            "timer", "start", &id, "boil", "--suffix", "main", "--minutes", "60",
        ]));
        let end: serde_json::Value = serde_json::from_str(&started).unwrap();
        let end = end["end_timestamp"].as_i64().unwrap();

        // The end is one hour after the start, so stopping at `end` measures
        // just under an hour of real time (the start has sub-second precision).
        let stop_at = end.to_string();
        let later = (end + 600).to_string();
        brewday(&dir)
            .args(["timer", "stop", &id, "boil", "--suffix", "main", "--at", &stop_at])
            .assert()
            .success();
        brewday(&dir)
            .args(["timer", "stop", &id, "boil", "--suffix", "main", "--at", &later])
            .assert()
            .success();

        let duration = stdout_of(brewday(&dir).args(["timer", "duration", &id, "boil", "--suffix", "main"]));
        let duration: serde_json::Value = serde_json::from_str(&duration).unwrap();
        let minutes = duration["real_duration_minutes"].as_f64().unwrap();
        assert!((59.9..=60.0).contains(&minutes), "got {minutes}");
    }

    #[test]
    fn test_out_of_range_minutes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["timer", "start", &id, "mash", "--minutes", "1e12"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("out of range"));
        brewday(&dir)
            .args(["timer", "start", &id, "mash", "--minutes", "inf"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("finite"));

        let started = stdout_of(brewday(&dir).args(["timer", "start", &id, "mash", "--minutes", "10"]));
        assert!(started.starts_with("{\"end_timestamp\":"));
    }

    #[test]
    fn test_duration_before_stop_fails() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["timer", "start", &id, "cooling", "--minutes", "20"])
            .assert()
            .success();
        brewday(&dir)
            .args(["timer", "duration", &id, "cooling"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cooling"));
    }
}

mod timeline_and_summary {
    use super::*;

    #[test]
    fn test_timeline_collects_events_in_order() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["timeline", "add", &id, "Mash in"])
            .assert()
            .success();
        brewday(&dir)
            .args(["status", "set", &id, "boiling"])
            .assert()
            .success();

        let timeline = stdout_of(brewday(&dir).args(["timeline", "show", &id]));
        let lines: Vec<&str> = timeline.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" Initialized Recipe"));
        assert!(lines[1].ends_with(" Mash in"));
        assert!(lines[2].ends_with(" Status changed to boiling"));
    }

    #[test]
    fn test_empty_timeline_message_is_rejected() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["timeline", "add", &id, ""])
            .assert()
            .failure();
    }

    #[test]
    fn test_summary_close_and_export() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);

        brewday(&dir)
            .args(["summary", "show", &id])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not closed"));

        brewday(&dir)
            .args(["summary", "close", &id])
            .assert()
            .success();
        brewday(&dir)
            .args(["summary", "close", &id])
            .assert()
            .failure();

        brewday(&dir)
            .args(["summary", "show", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("**Citra Pale Ale**"))
            .stdout(predicate::str::contains("- **Evaporation**: 0.00%/h"))
            .stdout(predicate::str::contains("| Initialized Recipe"));

        let out_dir = dir.path().join("reports");
        brewday(&dir)
            .args(["summary", "export", &id, "--output"])
            .arg(&out_dir)
            .assert()
            .success();
        let report = fs::read_to_string(out_dir.join(format!("{}.md", id))).unwrap();
        assert!(report.starts_with("# Summary"));
    }
}

mod dry_hops {
    use super::*;

    #[test]
    fn test_list_remind_and_confirm() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);

        brewday(&dir)
            .args(["dry-hop", "list", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Citra_1\tCitra(1)\t50.00g\thop\t-"))
            .stdout(predicate::str::contains("Citra_2\tCitra(2)\t30.00g\thop\t-"));

        brewday(&dir)
            .args(["dry-hop", "remind", &id, "Citra_1", "--at", "2099-01-01T08:00:00Z"])
            .assert()
            .success();
        brewday(&dir)
            .args(["dry-hop", "list", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Citra_1\tCitra(1)\t50.00g\thop\t2099-01-01T08:00:00+00:00"));

        brewday(&dir)
            .args(["dry-hop", "remind", &id, "Mosaic_1", "--at", "2099-01-01T08:00:00Z"])
            .assert()
            .failure();

        brewday(&dir)
            .args(["dry-hop", "confirm", &id, "Citra_1"])
            .assert()
            .success();
        brewday(&dir)
            .args(["dry-hop", "watch", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Watching 0 reminder(s)"));
    }

    #[test]
    fn test_watch_fires_expired_reminder() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["dry-hop", "remind", &id, "Citra_2", "--at", "2000-01-01T08:00:00Z"])
            .assert()
            .success();

        brewday(&dir)
            .args(["dry-hop", "watch", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Watching 1 reminder(s)"));

        brewday(&dir)
            .args(["timeline", "show", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry hop reminder sent for Citra(2)"));
    }
}

mod fermentation {
    use super::*;

    #[test]
    fn test_watch_rebuilds_fermentation_reminders() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["fermentation", "sg-remind", &id, "--first", "0", "--last", "1", "--unit", "seconds"])
            .assert()
            .success()
            .stdout(predicate::str::contains("SG reminder at").count(2));
        brewday(&dir)
            .args(["fermentation", "fridge-remind", &id, "--at", "2000-01-01T08:00:00Z"])
            .assert()
            .success();

        brewday(&dir)
            .args(["dry-hop", "watch", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Watching 3 reminder(s)"));

        brewday(&dir)
            .args(["timeline", "show", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("SG measurement reminder 2 sent"))
            .stdout(predicate::str::contains("Fridge reminder sent"));
    }

    #[test]
    fn test_sg_remind_rejects_reversed_range() {
        let dir = TempDir::new().unwrap();
        let id = add_recipe(&dir);
        brewday(&dir)
            .args(["fermentation", "sg-remind", &id, "--first", "5", "--last", "2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("comes before the first"));
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_init_show_validate() {
        let dir = TempDir::new().unwrap();
        brewday(&dir).args(["config", "init"]).assert().success();
        assert!(dir.path().join("brewday.toml").exists());

        brewday(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        brewday(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("store = \"sqlite\""));

        brewday(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_notify_without_gotify_fails() {
        let dir = TempDir::new().unwrap();
        brewday(&dir)
            .args(["notify", "hello"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Gotify is not configured"));
    }
}

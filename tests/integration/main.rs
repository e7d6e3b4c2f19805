//! Integration tests for cargo-groom

mod cli_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn groom() -> Command {
        Command::cargo_bin("cargo-groom").unwrap()
    }

    #[test]
    fn help_displays() {
        groom()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cargo cache grooming"));
    }

    #[test]
    fn version_displays() {
        groom()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cargo-groom"));
    }

    #[test]
    fn stamp_missing_snapshot_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        groom()
            .current_dir(dir.path())
            .args(["stamp", "nonexistent.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("nonexistent.json"));
    }

    #[test]
    fn invalid_settings_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("groom.toml");
        std::fs::write(&config, "not = valid = toml").unwrap();

        groom()
            .args(["--config", config.to_str().unwrap(), "key"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}

mod stamp_tests {
    use assert_cmd::Command;
    use std::fs;

    #[test]
    fn stamp_restores_recorded_mtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("dep-graph.bin");
        fs::write(&file, b"x").unwrap();

        // snapshot claiming the file was modified at a fixed point in time
        let snapshot = serde_json::json!({
            "roots": [dir.path().join("incremental")],
            "times": { file.to_str().unwrap(): 1_600_000_000_000u64 }
        });
        let snapshot_path = dir.path().join("mtimes.json");
        fs::write(&snapshot_path, snapshot.to_string()).unwrap();

        Command::cargo_bin("cargo-groom")
            .unwrap()
            .current_dir(dir.path())
            .args(["stamp", snapshot_path.to_str().unwrap()])
            .assert()
            .success();

        let mtime = fs::metadata(&file).unwrap().modified().unwrap();
        let expected = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        assert_eq!(mtime, expected);
    }
}

mod groom_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    /// A minimal package `cargo metadata` will accept
    fn write_project(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
        )
        .unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
    }

    #[test]
    fn groom_prunes_target_and_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        let project = dir.path().join("project");
        write_project(&project);

        // a restored target directory with stale artifacts
        let target = project.join("target");
        touch(&target.join("CACHEDIR.TAG"));
        touch(&target.join("debug/deps/old_dep-abc123.rlib"));
        touch(&target.join("debug/incremental/old-xyz/file.bin"));

        // a restored CARGO_HOME with credentials and a stale crate
        let cargo_home = dir.path().join("cargo-home");
        touch(&cargo_home.join("credentials.toml"));
        touch(
            &cargo_home
                .join("registry/cache/index.crates.io-6f17d22bba15001f/old-dep-0.1.0.crate"),
        );

        Command::cargo_bin("cargo-groom")
            .unwrap()
            .current_dir(&project)
            .env("CARGO_HOME", &cargo_home)
            .args([
                "groom",
                "--force",
                "--state-file",
                dir.path().join("state.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Groomed cache ready to save"));

        // the demo project has no third-party deps, so everything goes
        assert!(target.join("CACHEDIR.TAG").exists());
        assert!(!target.join("debug/deps/old_dep-abc123.rlib").exists());
        assert!(!target.join("debug/incremental").exists());
        assert!(!cargo_home.join("credentials.toml").exists());
        assert!(!cargo_home
            .join("registry/cache/index.crates.io-6f17d22bba15001f/old-dep-0.1.0.crate")
            .exists());
    }

    #[test]
    fn restore_then_groom_skips_when_up_to_date() {
        let dir = tempfile::TempDir::new().unwrap();
        let project = dir.path().join("project");
        write_project(&project);
        let state_file = dir.path().join("state.json");
        let cargo_home = dir.path().join("cargo-home");
        fs::create_dir_all(&cargo_home).unwrap();

        // ask for the key first so we can claim a full-match restore
        let output = Command::cargo_bin("cargo-groom")
            .unwrap()
            .current_dir(&project)
            .env("CARGO_HOME", &cargo_home)
            .arg("key")
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        let cache_key = stdout
            .lines()
            .skip_while(|l| !l.starts_with("Cache Key:"))
            .nth(1)
            .unwrap()
            .trim()
            .to_string();

        Command::cargo_bin("cargo-groom")
            .unwrap()
            .current_dir(&project)
            .env("CARGO_HOME", &cargo_home)
            .args([
                "restore",
                "--matched-key",
                &cache_key,
                "--state-file",
                state_file.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("full match: true"));

        Command::cargo_bin("cargo-groom")
            .unwrap()
            .current_dir(&project)
            .env("CARGO_HOME", &cargo_home)
            .args(["groom", "--state-file", state_file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache up-to-date."));
    }
}

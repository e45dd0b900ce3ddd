use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::Builder;

fn backdrop() -> Command {
    Command::cargo_bin("folio-backdrop").expect("binary exists")
}

#[test]
fn cli_spins_cube_and_prints_summary() {
    let mut cmd = backdrop();
    cmd.args(["cube", "--summary-only", "--frames", "10", "--seed", "1"]);
    cmd.assert()
        .success()
        .stdout(contains("Mounted wireframe-solid background (Wireframe Cube) at 1280x720"))
        .stdout(contains("Scene: 1 top-level object(s), 1 primitive(s)"))
        .stdout(contains("Overlay: code, globe, laptop, video"))
        .stdout(contains("Rendered 10 frame(s)"))
        .stdout(contains("Root rotation=(0.100, 0.100, 0.000)"));
}

#[test]
fn cli_reads_xml_config_and_writes_snapshot() {
    let mut config = Builder::new().suffix(".xml").tempfile().expect("temp config");
    config
        .write_all(
            br#"<background>
  <variant>bg1</variant>
  <width>96</width>
  <height>64</height>
  <seed>7</seed>
</background>
"#,
        )
        .expect("write config");
    let snapshot = Builder::new().suffix(".ppm").tempfile().expect("temp snapshot");

    let mut cmd = backdrop();
    cmd.arg(config.path())
        .args(["--summary-only", "--frames", "3", "--snapshot"])
        .arg(snapshot.path());
    cmd.assert()
        .success()
        .stdout(contains("Mounted cluster background (Polyhedra Cluster) at 96x64"))
        .stdout(contains("3003 primitive(s) (3000 point(s), 3 mesh(es), 1 group(s))"))
        .stdout(contains("Snapshot:"));

    let bytes = std::fs::read(snapshot.path()).expect("snapshot written");
    let header = b"P6\n96 64\n255\n";
    assert!(bytes.starts_with(header));
    assert_eq!(bytes.len(), header.len() + 96 * 64 * 3);
}

#[test]
fn cli_hero_reports_dark_appearance() {
    let mut cmd = backdrop();
    cmd.args(["hero", "--summary-only", "--frames", "1", "--dark", "--size", "64x64"]);
    cmd.assert()
        .success()
        .stdout(contains("Mounted particle-field background"))
        .stdout(contains("Appearance: Dark"));
}

#[test]
fn cli_rejects_unknown_variant() {
    let mut cmd = backdrop();
    cmd.args(["spiral", "--summary-only"]);
    cmd.assert()
        .failure()
        .stderr(contains("unknown variant `spiral`"));
}

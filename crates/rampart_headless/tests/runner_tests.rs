//! Protocol-level tests: JSON lines in, JSON lines out.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use rampart_headless::runner::{HeadlessConfig, HeadlessRunner};
use serde_json::Value;
use tempfile::TempDir;

const STRAIGHT: &str = r#"LevelDefinition(
    id: "straight",
    primary_path: [(x: 0, y: 5), (x: 20, y: 5)],
    hero_spawn: (x: 10, y: 6),
    starting_gold: 500,
    starting_lives: 20,
    waves: Some(custom((waves: [(groups: [(enemy: frosh, count: 5, interval_ms: 600)])]))),
    wave_gap_ms: 0,
)"#;

fn level_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("straight.ron");
    std::fs::write(&path, STRAIGHT).unwrap();
    path
}

fn load_line(path: &Path) -> String {
    serde_json::json!({"cmd": "load", "path": path}).to_string()
}

fn exchange(runner: &mut HeadlessRunner, lines: &[String]) -> Vec<Value> {
    let input = Cursor::new(lines.join("\n"));
    let mut output = Vec::new();
    runner.run(input, &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn scripted_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = vec![load_line(&level_file(&dir))];
    input.extend(lines(&[
        r#"{"cmd":"place","tower":"archer","x":6,"y":4}"#,
        r#"{"cmd":"call_wave"}"#,
        r#"{"cmd":"tick","count":60}"#,
        r#"{"cmd":"hash"}"#,
        r#"{"cmd":"bogus"}"#,
        "",
        r#"{"cmd":"quit"}"#,
        r#"{"cmd":"tick"}"#,
    ]));

    let mut runner = HeadlessRunner::new();
    let out = exchange(&mut runner, &input);
    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["ready", "loaded", "placed", "wave_called", "ticked", "state_hash", "error", "bye"]
    );

    assert_eq!(out[1]["level"], "straight");
    assert_eq!(out[1]["status"], "ready");
    assert_eq!(out[3]["wave"], 0);
    assert_eq!(out[4]["tick"], 60);
    assert_eq!(out[4]["summary"]["spawned"], 2);
    assert_eq!(out[5]["tick"], 60);
    assert_eq!(out[5]["hash"], runner.session().state_hash());
    assert!(out[6].get("cmd").is_none());
    // The tick after quit was never processed.
    assert_eq!(runner.session().tick_count(), 60);
}

#[test]
fn game_over_follows_the_final_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = vec![load_line(&level_file(&dir))];
    input.extend(lines(&[
        r#"{"cmd":"call_wave"}"#,
        r#"{"cmd":"tick","count":3000}"#,
    ]));

    let out = exchange(&mut HeadlessRunner::new(), &input);
    let last = out.last().unwrap();
    assert_eq!(last["type"], "game_over");
    assert_eq!(last["result"]["outcome"], "victory");
    assert_eq!(last["result"]["stars"], 2);
    assert_eq!(last["result"]["escaped"], 5);
    assert_eq!(out[out.len() - 2]["type"], "ticked");
    assert_eq!(out[out.len() - 2]["summary"]["lives_lost"], 5);
}

#[test]
fn rejected_commands_report_the_command_name() {
    let input = lines(&[
        r#"{"cmd":"place","tower":"archer","x":6,"y":4}"#,
        r#"{"cmd":"pause"}"#,
        r#"{"cmd":"load","path":"/nonexistent/level.ron"}"#,
    ]);

    let out = exchange(&mut HeadlessRunner::new(), &input);
    assert_eq!(out.len(), 4);
    for (response, cmd) in out[1..].iter().zip(["place", "pause", "load"]) {
        assert_eq!(response["type"], "error");
        assert_eq!(response["cmd"], cmd);
    }
}

#[test]
fn off_field_targets_are_rejected_and_ticks_continue() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = vec![load_line(&level_file(&dir))];
    input.extend(lines(&[
        r#"{"cmd":"call_wave"}"#,
        r#"{"cmd":"tick","count":40}"#,
        r#"{"cmd":"cast","spell":"meteor","x":100000.0,"y":0.0}"#,
        r#"{"cmd":"cast","spell":"meteor","x":3000000000.0,"y":0.0}"#,
        r#"{"cmd":"place","tower":"archer","x":-4,"y":4}"#,
        r#"{"cmd":"tick","count":600}"#,
    ]));

    let mut runner = HeadlessRunner::new();
    let out = exchange(&mut runner, &input);
    let types: Vec<&str> = out.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["ready", "loaded", "wave_called", "ticked", "error", "error", "error", "ticked"]
    );
    assert_eq!(out[4]["cmd"], "cast");
    assert_eq!(out[6]["cmd"], "place");
    assert_eq!(out[7]["tick"], 640);
}

#[test]
fn speed_is_clamped_and_reset_rewinds() {
    let dir = tempfile::tempdir().unwrap();
    let mut input = vec![load_line(&level_file(&dir))];
    input.extend(lines(&[
        r#"{"cmd":"speed","multiplier":10.0}"#,
        r#"{"cmd":"call_wave"}"#,
        r#"{"cmd":"tick","count":30}"#,
        r#"{"cmd":"reset"}"#,
        r#"{"cmd":"hash"}"#,
    ]));

    let mut runner = HeadlessRunner::new();
    let out = exchange(&mut runner, &input);
    assert_eq!(out[2]["type"], "speed_set");
    assert_eq!(out[2]["multiplier"], 4.0);
    assert_eq!(out[5]["type"], "ack");
    assert_eq!(out[6]["tick"], 0);
    assert_eq!(runner.session().history().attempts, 1);
}

#[test]
fn auto_state_replaces_tick_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let config = HeadlessConfig {
        auto_state_output: true,
        level_path: Some(level_file(&dir)),
        data_path: None,
    };
    let mut runner = HeadlessRunner::with_config(config).unwrap();
    let input = lines(&[
        r#"{"cmd":"place","tower":"cannon","x":8,"y":4}"#,
        r#"{"cmd":"call_wave"}"#,
        r#"{"cmd":"tick","count":10}"#,
    ]);

    let out = exchange(&mut runner, &input);
    let state = out.last().unwrap();
    assert_eq!(state["type"], "state");
    assert_eq!(state["snapshot"]["tick"], 10);
    assert_eq!(state["snapshot"]["gold"], 380);
    assert_eq!(state["snapshot"]["towers"].as_array().unwrap().len(), 1);
    assert_eq!(state["snapshot"]["enemies"].as_array().unwrap().len(), 1);
    assert_eq!(state["hash"], runner.session().state_hash());
}

#[test]
fn bundled_levels_load() {
    let levels = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../levels");
    let data = rampart_headless::load_game_data(None).unwrap();
    let loaded = rampart_headless::level_loader::load_level_directory(&levels, &data).unwrap();
    let ids: Vec<_> = loaded.iter().map(|(_, level)| level.id.as_str()).collect();
    assert_eq!(ids, vec!["crossroads", "meadow", "proving_ground"]);
}

//! Directory validation against real files.

use std::fs;
use std::path::Path;

use rampart_core::data::GameData;
use rampart_tools::validate::{check_directory, validate_data_directory, FileKind, ValidationError};

#[test]
fn bundled_levels_pass() {
    let levels = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../levels");
    let checked = validate_data_directory(&levels, &GameData::builtin()).unwrap();
    assert_eq!(checked, 3);
}

#[test]
fn mixed_directory_reports_each_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a_level.ron"),
        r#"LevelDefinition(
            id: "loop",
            primary_path: [(x: 0, y: 0), (x: 0, y: 0)],
            hero_spawn: (x: 1, y: 1),
            starting_gold: 100,
            starting_lives: 10,
        )"#,
    )
    .unwrap();
    let tables = ron::ser::to_string(&GameData::builtin()).unwrap();
    fs::write(dir.path().join("b_tables.ron"), tables).unwrap();
    fs::write(dir.path().join("readme.md"), "ignored").unwrap();

    let reports = check_directory(dir.path(), &GameData::builtin()).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].kind, FileKind::Level);
    assert!(reports[0].problem.as_deref().unwrap().contains("primary path"));
    assert_eq!(reports[1].kind, FileKind::Data);
    assert!(reports[1].is_ok());

    let err = validate_data_directory(dir.path(), &GameData::builtin()).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::Failed {
            failed: 1,
            checked: 2
        }
    ));
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = check_directory(&dir.path().join("absent"), &GameData::builtin()).unwrap_err();
    assert!(matches!(err, ValidationError::DirectoryNotFound(_)));
}

//! End-to-end tests for publishing the Alexa allowlist into a configuration
//! directory laid out like a Home Assistant add-on mount.

use std::fs;

use ha_config::{
    parse_document, AlexaConfigMutator, ConfigError, ConfigPaths, CustomTagValue, HaTag,
    PipelineStage,
};
use tempfile::TempDir;

const CONFIGURATION: &str = r#"homeassistant:
  name: Home
  customize: !include customize.yaml
  packages: !include_dir_named packages
http:
  api_password: !secret http_password
automation: !include_dir_merge_list automations/
script: !include_dir_list scripts
scene: !include_dir_merge_named scenes
sensor:
  - platform: template
    value: !env_var SENSOR_VALUE
blueprint_value: !input motion_entity
alexa:
  smart_home:
    locale: en-US
    filter:
      include_entities:
        - old.x
"#;

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn setup(content: &str) -> (TempDir, AlexaConfigMutator) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("homeassistant")).unwrap();
    let paths = ConfigPaths::under(dir.path());
    fs::write(&paths.config_file, content).unwrap();
    (dir, AlexaConfigMutator::new(paths))
}

#[test]
fn test_publish_replaces_include_entities() {
    let (_dir, mutator) = setup(CONFIGURATION);

    let outcome = mutator
        .update_alexa_configuration(&ids(&["light.a", "switch.b"]))
        .unwrap();
    assert_eq!(outcome.entities_count, 2);

    let written = fs::read_to_string(&mutator.paths().config_file).unwrap();
    let doc = parse_document(&written).unwrap();
    assert_eq!(ha_config::included_entities(&doc), ids(&["light.a", "switch.b"]));
    assert!(!written.contains("old.x"));

    let backup = fs::read_to_string(&mutator.paths().backup_file).unwrap();
    assert_eq!(backup, CONFIGURATION);
}

#[test]
fn test_publish_preserves_custom_tags() {
    let (_dir, mutator) = setup(CONFIGURATION);
    mutator
        .update_alexa_configuration(&ids(&["light.a"]))
        .unwrap();

    let written = fs::read_to_string(&mutator.paths().config_file).unwrap();
    let doc = parse_document(&written).unwrap();

    let expect = |path: &[&str], tag: HaTag, value: &str| {
        assert_eq!(
            doc.get_path(path).and_then(|v| v.as_custom_tag()),
            Some(&CustomTagValue::new(tag, value)),
            "at {:?} in:\n{}",
            path,
            written
        );
    };
    expect(&["homeassistant", "customize"], HaTag::Include, "customize.yaml");
    expect(&["homeassistant", "packages"], HaTag::IncludeDirNamed, "packages");
    expect(&["http", "api_password"], HaTag::Secret, "http_password");
    expect(&["automation"], HaTag::IncludeDirMergeList, "automations/");
    expect(&["script"], HaTag::IncludeDirList, "scripts");
    expect(&["scene"], HaTag::IncludeDirMergeNamed, "scenes");
    expect(&["blueprint_value"], HaTag::Input, "motion_entity");

    let sensor = doc
        .get_path(&["sensor"])
        .and_then(|v| v.as_sequence())
        .unwrap();
    assert_eq!(
        sensor[0].get("value").and_then(|v| v.as_custom_tag()),
        Some(&CustomTagValue::new(HaTag::EnvVar, "SENSOR_VALUE"))
    );

    // Untouched siblings keep their values and order
    assert_eq!(
        doc.get_path(&["alexa", "smart_home", "locale"])
            .and_then(|v| v.as_str()),
        Some("en-US")
    );
    let top_keys: Vec<_> = doc
        .root()
        .as_mapping()
        .unwrap()
        .keys()
        .filter_map(|k| k.as_str())
        .collect();
    assert_eq!(
        top_keys,
        vec![
            "homeassistant",
            "http",
            "automation",
            "script",
            "scene",
            "sensor",
            "blueprint_value",
            "alexa"
        ]
    );
}

#[test]
fn test_invalid_ids_abort_before_io() {
    let (_dir, mutator) = setup(CONFIGURATION);

    let err = mutator
        .update_alexa_configuration(&ids(&["invalid-entity"]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEntityIds { .. }));
    assert_eq!(err.stage(), PipelineStage::Validate);
    assert_eq!(err.to_string(), "Invalid entity ID format detected");

    assert_eq!(
        fs::read_to_string(&mutator.paths().config_file).unwrap(),
        CONFIGURATION
    );
    assert!(!mutator.paths().backup_file.exists());
}

#[test]
fn test_invalid_ids_abort_even_without_config_file() {
    let dir = TempDir::new().unwrap();
    let mutator = AlexaConfigMutator::new(ConfigPaths::under(dir.path()));

    let err = mutator
        .update_alexa_configuration(&ids(&["light.ok", "light.living room"]))
        .unwrap_err();
    assert_eq!(err.stage(), PipelineStage::Validate);
}

#[test]
fn test_publish_into_document_without_alexa_section() {
    let (_dir, mutator) = setup("homeassistant:\n  name: Home\n");
    mutator
        .update_alexa_configuration(&ids(&["climate.thermostat_2"]))
        .unwrap();

    assert_eq!(
        mutator.current_allowlist().unwrap(),
        ids(&["climate.thermostat_2"])
    );
}

#[test]
fn test_publish_empty_list_clears_allowlist() {
    let (_dir, mutator) = setup(CONFIGURATION);
    let outcome = mutator.update_alexa_configuration(&[]).unwrap();
    assert_eq!(outcome.entities_count, 0);
    assert!(mutator.current_allowlist().unwrap().is_empty());
}

#[test]
fn test_merge_conflict_does_not_write() {
    let original = "alexa: !include alexa.yaml\n";
    let (_dir, mutator) = setup(original);

    let err = mutator
        .update_alexa_configuration(&ids(&["light.a"]))
        .unwrap_err();
    assert_eq!(err.stage(), PipelineStage::Merge);
    assert_eq!(
        fs::read_to_string(&mutator.paths().config_file).unwrap(),
        original
    );
    // Backup runs before the merge step
    assert_eq!(
        fs::read_to_string(&mutator.paths().backup_file).unwrap(),
        original
    );
}

#[test]
fn test_second_publish_backs_up_previous_state() {
    let (_dir, mutator) = setup(CONFIGURATION);
    mutator
        .update_alexa_configuration(&ids(&["light.a"]))
        .unwrap();
    let after_first = fs::read_to_string(&mutator.paths().config_file).unwrap();

    mutator
        .update_alexa_configuration(&ids(&["switch.b"]))
        .unwrap();
    assert_eq!(
        fs::read_to_string(&mutator.paths().backup_file).unwrap(),
        after_first
    );
    assert_eq!(mutator.current_allowlist().unwrap(), ids(&["switch.b"]));
}

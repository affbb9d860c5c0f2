use crate::archive::RuleArchive;
use crate::error::RuleError;
use crate::types::{self, Prom, Rule};
use alertengine_common::labels::Labels;
use std::time::Duration;
use tempfile::TempDir;

fn make_rule(id: i64, prom_id: i64) -> Rule {
    Rule {
        id,
        prom_id,
        expr: "up".to_string(),
        op: ">".to_string(),
        value: "0".to_string(),
        for_: "120s".to_string(),
        labels: Labels::from([("severity".to_string(), "page".to_string())]),
        summary: "instance down".to_string(),
        description: "no scrape target".to_string(),
    }
}

#[test]
fn full_expr_joins_and_trims() {
    let rule = make_rule(1, 7);
    assert_eq!(rule.full_expr(), "up > 0");

    let mut empty_expr = make_rule(2, 7);
    empty_expr.expr = String::new();
    assert_eq!(empty_expr.full_expr(), "> 0");
}

#[test]
fn yaml_content_shape() {
    let rules = vec![make_rule(1, 7)];
    let content = types::rules_content(&rules).unwrap();
    let yaml = String::from_utf8(content).unwrap();

    assert!(yaml.contains("name: ruleengine"));
    assert!(yaml.contains("alert: '1'"));
    assert!(yaml.contains("expr: up > 0"));
    assert!(yaml.contains("for: 120s"));
    assert!(yaml.contains("severity: page"));
    assert!(yaml.contains("rule_id: '1'"));
    assert!(yaml.contains("prom_id: '7'"));
    assert!(yaml.contains("summary: instance down"));
}

#[test]
fn yaml_content_is_stable() {
    let rules = vec![make_rule(1, 7), make_rule(2, 7)];
    let first = types::rules_content(&rules).unwrap();
    let second = types::rules_content(&rules).unwrap();
    assert_eq!(first, second);
}

#[test]
fn group_by_prom_partitions_rules() {
    let rules = vec![make_rule(1, 7), make_rule(2, 7), make_rule(3, 9)];
    let mut groups = types::group_by_prom(&rules);
    groups.sort_by_key(|g| g.prom.id);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].prom, Prom { id: 7, url: String::new() });
    assert_eq!(groups[0].rules.len(), 2);
    assert_eq!(groups[1].prom.id, 9);
    assert_eq!(groups[1].rules.len(), 1);
}

#[test]
fn save_without_history_overwrites_current() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, false).unwrap();

    let path = archive.save(7, b"groups: []\n").unwrap();
    assert_eq!(path, archive.current_path(7));
    assert!(path.ends_with("prom_7/current.yml"));

    archive.save(7, b"groups: [x]\n").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"groups: [x]\n");
}

#[test]
fn save_with_history_writes_under_history_dir() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();

    let path = archive.save(7, b"groups: []\n").unwrap();
    assert!(path.starts_with(dir.path().join("prom_7").join("history")));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("rule_") && name.ends_with(".yml"));
}

#[test]
fn list_versions_orders_newest_first() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    let history = dir.path().join("prom_7").join("history");
    std::fs::create_dir_all(&history).unwrap();

    for name in ["rule_a.yml", "rule_b.yml", "rule_c.yml"] {
        std::fs::write(history.join(name), name.as_bytes()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }
    // Subdirectories must be skipped
    std::fs::create_dir(history.join("nested")).unwrap();

    let versions = archive.list_versions(7, 0).unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(versions[0].version, 1);
    assert!(versions[0].file_path.ends_with("rule_c.yml"));
    assert!(versions[2].file_path.ends_with("rule_a.yml"));
    assert!(versions[0].created_at >= versions[1].created_at);
    assert_eq!(versions[0].prom_id, 7);
    // sha256 of the file bytes
    assert_eq!(versions[0].hash.len(), 64);
}

#[test]
#[cfg(unix)]
fn save_applies_explicit_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    let path = archive.save(7, b"groups: []\n").unwrap();

    let mode = |p: &std::path::Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode(&path), 0o644);
    let prom_dir = dir.path().join("prom_7");
    assert_eq!(mode(&prom_dir), 0o755);
    assert_eq!(mode(&prom_dir.join("history")), 0o755);
}

#[test]
#[cfg(unix)]
fn list_versions_renumbers_past_unreadable_files() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    let history = dir.path().join("prom_7").join("history");
    std::fs::create_dir_all(&history).unwrap();

    for name in ["rule_a.yml", "rule_b.yml", "rule_c.yml"] {
        std::fs::write(history.join(name), name.as_bytes()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }
    let blocked = history.join("rule_b.yml");
    std::fs::set_permissions(&blocked, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&blocked).is_ok() {
        // running privileged: permission bits don't block reads
        return;
    }

    let versions = archive.list_versions(7, 0).unwrap();
    assert_eq!(versions.len(), 2);
    let ordinals: Vec<i64> = versions.iter().map(|v| v.version).collect();
    assert_eq!(ordinals, vec![1, 2]);
    assert!(versions[0].file_path.ends_with("rule_c.yml"));
    assert!(versions[1].file_path.ends_with("rule_a.yml"));
}

#[test]
fn list_versions_respects_limit() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    let history = dir.path().join("prom_7").join("history");
    std::fs::create_dir_all(&history).unwrap();
    for i in 0..4 {
        std::fs::write(history.join(format!("rule_{i}.yml")), b"x").unwrap();
    }

    assert_eq!(archive.list_versions(7, 2).unwrap().len(), 2);
    assert_eq!(archive.list_versions(7, 0).unwrap().len(), 4);
    assert_eq!(archive.list_versions(7, 100).unwrap().len(), 4);
}

#[test]
fn list_versions_missing_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    assert!(archive.list_versions(42, 0).unwrap().is_empty());
}

#[test]
fn list_versions_fails_when_history_disabled() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, false).unwrap();
    assert!(matches!(
        archive.list_versions(7, 0),
        Err(RuleError::HistoryDisabled)
    ));
}

#[test]
fn cleanup_removes_expired_versions() {
    let dir = TempDir::new().unwrap();
    // Zero retention: everything already written is older than the cutoff.
    let archive = RuleArchive::new(dir.path(), 0, true).unwrap();
    archive.save(7, b"a").unwrap();
    std::thread::sleep(Duration::from_millis(10));

    let deleted = archive.cleanup_old_versions().unwrap();
    assert_eq!(deleted, 1);
    assert!(archive.list_versions(7, 0).unwrap().is_empty());
}

#[test]
fn cleanup_keeps_recent_versions() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    archive.save(7, b"a").unwrap();

    let deleted = archive.cleanup_old_versions().unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(archive.list_versions(7, 0).unwrap().len(), 1);
}

#[test]
fn cleanup_is_noop_without_history() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 0, false).unwrap();
    archive.save(7, b"a").unwrap();

    assert_eq!(archive.cleanup_old_versions().unwrap(), 0);
    assert!(archive.current_path(7).exists());
}

#[test]
fn hash_matches_content() {
    let dir = TempDir::new().unwrap();
    let archive = RuleArchive::new(dir.path(), 30, true).unwrap();
    let history = dir.path().join("prom_7").join("history");
    std::fs::create_dir_all(&history).unwrap();
    std::fs::write(history.join("rule_x.yml"), b"hello").unwrap();

    let versions = archive.list_versions(7, 0).unwrap();
    // sha256("hello")
    assert_eq!(
        versions[0].hash,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

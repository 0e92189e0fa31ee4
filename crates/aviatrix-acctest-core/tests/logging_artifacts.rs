#![forbid(unsafe_code)]

use std::path::Path;
use std::thread;
use std::time::Duration;

use aviatrix_acctest_core::{
    EnvSnapshot, LogEntry, LogLevel, LoggerFactory, LoggerOptions, TestConfiguration, TestLogger,
    TestReport,
};

fn entries(path: &Path) -> Vec<LogEntry> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn debug_entries_follow_detailed_logs_setting() {
    let dir = tempfile::tempdir().unwrap();
    for (detailed, expect_debug) in [("false", false), ("true", true)] {
        let env = EnvSnapshot::from_pairs([("ENABLE_DETAILED_LOGS", detailed)])
            .with("TEST_ARTIFACT_DIR", dir.path().display().to_string());
        let config = TestConfiguration::resolve(&env);
        let name = format!("TestDebug_{detailed}");
        let logger = LoggerFactory::from_config(&config).create_logger(&name).unwrap();
        logger.debug("API Call: GET /v1/api");
        logger.info("visible");
        logger.close().unwrap();

        let levels: Vec<LogLevel> = entries(logger.log_path()).iter().map(|e| e.level).collect();
        assert_eq!(levels.contains(&LogLevel::Debug), expect_debug, "detailed={detailed}");
        assert!(levels.contains(&LogLevel::Info));
    }
}

#[test]
fn report_records_final_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let logger = TestLogger::new("TestReport", LoggerOptions::new(dir.path())).unwrap();
    logger.add_metadata("gateway", "gw-1");
    logger.log_resource_destruction("aviatrix_gateway", "gw-1");
    logger.close().unwrap();

    let raw = std::fs::read_to_string(logger.report_path()).unwrap();
    let report: TestReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(report.test_name, "TestReport");
    assert_eq!(report.final_metadata["gateway"], "gw-1");
    assert_eq!(report.artifact_dir, dir.path().display().to_string());

    // Writes after close are dropped rather than reopening the file.
    let before = entries(logger.log_path()).len();
    logger.info("late");
    assert_eq!(entries(logger.log_path()).len(), before);
}

#[test]
fn prune_removes_only_stale_logs() {
    let dir = tempfile::tempdir().unwrap();
    let factory = LoggerFactory::new(LoggerOptions::new(dir.path()).write_report_on_close(false));
    let old = factory.create_logger("TestOld").unwrap();
    old.close().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(factory.cleanup_old_logs(Duration::from_secs(3600)).unwrap(), 0);
    assert_eq!(factory.cleanup_old_logs(Duration::ZERO).unwrap(), 1);
    assert!(!old.log_path().exists());

    let empty = LoggerFactory::new(LoggerOptions::new(dir.path().join("missing")));
    assert_eq!(empty.cleanup_old_logs(Duration::ZERO).unwrap(), 0);
}

//! Orchestrator construction and the queries it answers without building.

use std::sync::Arc;

use zcbe_lib::consts::LEDGER_FILENAME;
use zcbe_lib::env::to_posix;
use zcbe_lib::{
  BuildOptions, Confirmation, ConfigError, ConfirmationProvider, DepKind, LedgerError, Orchestrator,
  OrchestratorError, WarningPolicy,
};

use super::common::{HOST, MockLoader, TestBuild};

fn with_confirm(build: &TestBuild, confirm: ConfirmationProvider) -> Result<Arc<Orchestrator>, OrchestratorError> {
  Orchestrator::with_loader(
    build.root(),
    &BuildOptions::default(),
    Arc::new(WarningPolicy::with_defaults()),
    confirm,
    Arc::new(MockLoader::new()),
  )
}

#[test]
fn construction_creates_prefix_and_ledger() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());

  assert!(build.prefix().is_dir());
  assert!(build.prefix().join(LEDGER_FILENAME).is_file());
  assert_eq!(orch.ledger().path(), build.prefix().join(LEDGER_FILENAME));
  assert_eq!(orch.settings().triplet, HOST);
}

#[test]
fn missing_mapping_fails_construction() {
  let build = TestBuild::new(&[]);
  std::fs::remove_file(build.root().join("mapping.toml")).unwrap();

  let err = build.orchestrator_with(&BuildOptions::default(), MockLoader::new()).unwrap_err();
  assert!(matches!(err, OrchestratorError::Config(ConfigError::MappingNotFound(_))));
  assert!(!build.prefix().join(LEDGER_FILENAME).exists());
}

#[test]
fn missing_manifest_fails_construction() {
  let build = TestBuild::new(&[]);
  std::fs::remove_file(build.root().join("build.toml")).unwrap();

  let err = build.orchestrator_with(&BuildOptions::default(), MockLoader::new()).unwrap_err();
  assert!(matches!(err, OrchestratorError::Config(ConfigError::NotFound(_))));
}

#[test]
fn environment_is_computed() {
  let build = TestBuild::with_manifest(&[], "\n[env]\nPKG_CONFIG_PATH = \"$ZCPREF/lib/pkgconfig\"\n");
  let orch = build.orchestrator(MockLoader::new());
  let prefix = to_posix(&build.prefix());

  assert_eq!(orch.env().get("ZCPREF"), Some(prefix.as_str()));
  assert_eq!(orch.env().get("ZCHOST"), Some(HOST));
  assert_eq!(
    orch.env().get("PKG_CONFIG_PATH"),
    Some(format!("{}/lib/pkgconfig", prefix).as_str())
  );
}

#[test]
fn overrides_win() {
  let build = TestBuild::new(&[]);
  let options = BuildOptions {
    build_name: Some("native".to_string()),
    triplet: Some("aarch64-linux-gnu".to_string()),
    prefix: Some(build.root().join("elsewhere")),
    ..BuildOptions::default()
  };
  let orch = build.orchestrator_with(&options, MockLoader::new()).unwrap();

  assert_eq!(orch.settings().build_name, "native");
  assert_eq!(orch.settings().triplet, "aarch64-linux-gnu");
  assert!(build.root().join("elsewhere").join(LEDGER_FILENAME).is_file());
}

#[test]
fn project_path_resolves_mapping() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());
  assert_eq!(orch.project_path("zlib").unwrap(), build.project_dir("zlib"));
}

#[test]
fn project_path_unknown_name() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());

  let err = orch.project_path("ghost").unwrap_err();
  assert_eq!(err.to_string(), "project \"ghost\" not found");
}

#[test]
fn project_path_rereads_mapping() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());
  assert!(orch.project_path("late").is_err());

  build.write_mapping(&["zlib", "late"]);
  assert_eq!(orch.project_path("late").unwrap(), build.project_dir("late"));
}

#[test]
fn project_loads_through_loader() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());

  let project = orch.project("zlib").unwrap();
  assert_eq!(project.name(), "zlib");
  assert!(project.requirements().is_empty());
}

#[test]
fn unbuilt_reflects_ledger() {
  let build = TestBuild::new(&["zlib", "curl"]);
  let orch = build.orchestrator(MockLoader::new());

  assert_eq!(orch.unbuilt_projects().unwrap(), vec!["zlib", "curl"]);
  assert!(orch.show_unbuilt().unwrap());

  orch.ledger().add(DepKind::Req, "zlib").unwrap();
  assert_eq!(orch.unbuilt_projects().unwrap(), vec!["curl"]);

  orch.ledger().add(DepKind::Req, "curl").unwrap();
  assert!(!orch.show_unbuilt().unwrap());
}

#[test]
fn global_build_tools_are_confirmed() {
  let build = TestBuild::with_manifest(&[], "\n[deps]\nbuild = [\"make\"]\n");
  let orch = with_confirm(
    &build,
    ConfirmationProvider::scripted([Confirmation::Pending, Confirmation::Confirmed]),
  )
  .unwrap();

  assert!(orch.ledger().is_satisfied(DepKind::Build, "make"));

  // Recorded tools are not asked about again.
  with_confirm(&build, ConfirmationProvider::scripted(Vec::<Confirmation>::new())).unwrap();
}

#[test]
fn declined_build_tool_fails_construction() {
  let build = TestBuild::with_manifest(&[], "\n[deps]\nbuild = [\"make\"]\n");

  let err = with_confirm(&build, ConfirmationProvider::scripted([Confirmation::Declined])).unwrap_err();
  assert!(matches!(err, OrchestratorError::Ledger(LedgerError::Declined { ref tool }) if tool == "make"));
}

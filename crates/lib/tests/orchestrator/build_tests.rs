//! Concurrent builds: deduplication, ordering, failures and job limits.

use std::time::Duration;

use tokio::time::timeout;

use zcbe_lib::{BuildError, BuildOptions, MappingError};

use super::common::{MockBehavior, MockLoader, TestBuild, is_cancelled, is_cycle};

const LIMIT: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_build_once() {
  let build = TestBuild::new(&["zlib"]);
  let loader = MockLoader::new().with("zlib", MockBehavior::slow(Duration::from_millis(50)));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let first = orch.build("zlib");
  let second = orch.build("zlib");
  assert!(orch.build_many(["zlib", "zlib"]).await);
  first.await.unwrap();
  second.await.unwrap();

  assert_eq!(tracker.count("zlib"), 1);
}

#[tokio::test]
async fn finished_build_is_not_repeated() {
  let build = TestBuild::new(&["zlib"]);
  let loader = MockLoader::new();
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  orch.build("zlib").await.unwrap();
  orch.build("zlib").await.unwrap();
  assert_eq!(tracker.count("zlib"), 1);
}

#[tokio::test]
async fn failure_does_not_stop_batch() {
  let build = TestBuild::new(&["broken", "fine"]);
  let loader = MockLoader::new().with("broken", MockBehavior::failing());
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let report = orch.build_many_report(["broken", "fine"]).await;
  assert!(!report.is_success());
  assert_eq!(report.succeeded, vec!["fine"]);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].0, "broken");
  assert!(matches!(*report.failed[0].1, BuildError::Script { code: Some(1), .. }));
  assert_eq!(tracker.count("fine"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fatal_warning_halts_pending_builds() {
  let build = TestBuild::new(&["bad", "slow", "waiting", "late"]);
  let loader = MockLoader::new()
    .with("bad", MockBehavior::fatal())
    .with("slow", MockBehavior::slow(Duration::from_millis(200)))
    .with("waiting", MockBehavior::requires(&["slow"]));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let report = orch.build_many_report(["bad", "waiting"]).await;
  assert!(orch.is_halted());
  assert!(report.succeeded.is_empty());
  assert!(report.fatal_warning().is_some());
  let (name, err) = &report.failed[1];
  assert_eq!(name, "waiting");
  assert!(is_cancelled(err));
  assert_eq!(tracker.count("waiting"), 0);

  let late = orch.build("late").await.unwrap_err();
  assert!(matches!(*late, BuildError::Cancelled));
  assert_eq!(tracker.count("late"), 0);
}

#[tokio::test]
async fn plain_failure_does_not_halt() {
  let build = TestBuild::new(&["broken", "fine"]);
  let orch = build.orchestrator(MockLoader::new().with("broken", MockBehavior::failing()));

  orch.build("broken").await.unwrap_err();
  assert!(!orch.is_halted());
  orch.build("fine").await.unwrap();
}

#[tokio::test]
async fn build_many_reports_failure() {
  let build = TestBuild::new(&["broken", "fine"]);
  let orch = build.orchestrator(MockLoader::new().with("broken", MockBehavior::failing()));
  assert!(!orch.build_many(["fine", "broken"]).await);
}

#[tokio::test]
async fn empty_batch_succeeds() {
  let build = TestBuild::new(&["zlib"]);
  let loader = MockLoader::new();
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  assert!(orch.build_many(Vec::<String>::new()).await);
  let report = orch.build_many_report(Vec::<String>::new()).await;
  assert_eq!(report.total(), 0);
  assert_eq!(tracker.count("zlib"), 0);
}

#[tokio::test]
async fn requirements_finish_first() {
  let build = TestBuild::new(&["binutils", "gcc", "glibc"]);
  let loader = MockLoader::new()
    .with("gcc", MockBehavior::requires(&["binutils"]))
    .with("glibc", MockBehavior::requires(&["gcc"]));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  orch.build("glibc").await.unwrap();
  assert_eq!(tracker.finished(), vec!["binutils", "gcc", "glibc"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_requirement_builds_once() {
  let build = TestBuild::new(&["zlib", "curl", "git"]);
  let loader = MockLoader::new()
    .with("zlib", MockBehavior::slow(Duration::from_millis(30)))
    .with("curl", MockBehavior::requires(&["zlib"]))
    .with("git", MockBehavior::requires(&["zlib"]));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let report = orch.build_many_report(["curl", "git"]).await;
  assert!(report.is_success());
  assert_eq!(tracker.count("zlib"), 1);
  assert_eq!(tracker.finished()[0], "zlib");
}

#[tokio::test]
async fn failed_requirement_skips_dependent() {
  let build = TestBuild::new(&["zlib", "curl"]);
  let loader = MockLoader::new()
    .with("zlib", MockBehavior::failing())
    .with("curl", MockBehavior::requires(&["zlib"]));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let err = orch.build("curl").await.unwrap_err();
  match &*err {
    BuildError::Dependency { dependency, source } => {
      assert_eq!(dependency, "zlib");
      assert!(matches!(**source, BuildError::Script { .. }));
    }
    other => panic!("expected dependency failure, got {other:?}"),
  }
  assert_eq!(tracker.count("curl"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mutual_requirement_is_a_cycle() {
  let build = TestBuild::new(&["a", "b"]);
  let loader = MockLoader::new()
    .with("a", MockBehavior::requires(&["b"]))
    .with("b", MockBehavior::requires(&["a"]));
  let tracker = loader.tracker();
  let orch = build.orchestrator(loader);

  let result = timeout(LIMIT, orch.build("a")).await.expect("cycle must not hang");
  assert!(is_cycle(&result.unwrap_err()));
  assert_eq!(tracker.count("a"), 0);
  assert_eq!(tracker.count("b"), 0);
}

#[tokio::test]
async fn self_requirement_is_a_cycle() {
  let build = TestBuild::new(&["a"]);
  let orch = build.orchestrator(MockLoader::new().with("a", MockBehavior::requires(&["a"])));

  let err = timeout(LIMIT, orch.build("a")).await.unwrap().unwrap_err();
  match &*err {
    BuildError::Cycle(path) => assert_eq!(path, &vec!["a".to_string(), "a".to_string()]),
    other => panic!("expected cycle, got {other:?}"),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn job_limit_is_respected() {
  let names = ["p1", "p2", "p3", "p4", "p5", "p6"];
  let build = TestBuild::new(&names);
  let mut loader = MockLoader::new();
  for name in names {
    loader = loader.with(name, MockBehavior::slow(Duration::from_millis(40)));
  }
  let tracker = loader.tracker();
  let options = BuildOptions {
    max_jobs: Some(2),
    ..BuildOptions::default()
  };
  let orch = build.orchestrator_with(&options, loader).unwrap();

  assert!(orch.build_many(names).await);
  assert!(tracker.peak() <= 2, "peak was {}", tracker.peak());
  for name in names {
    assert_eq!(tracker.count(name), 1);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_job_handles_deep_chain() {
  let build = TestBuild::new(&["a", "b", "c", "d"]);
  let loader = MockLoader::new()
    .with("b", MockBehavior::requires(&["a"]))
    .with("c", MockBehavior::requires(&["b"]))
    .with("d", MockBehavior::requires(&["c"]));
  let tracker = loader.tracker();
  let options = BuildOptions {
    max_jobs: Some(1),
    ..BuildOptions::default()
  };
  let orch = build.orchestrator_with(&options, loader).unwrap();

  let ok = timeout(LIMIT, orch.build_many(["d", "c"])).await.expect("chain must not deadlock");
  assert!(ok);
  assert_eq!(tracker.finished(), vec!["a", "b", "c", "d"]);
  assert_eq!(tracker.peak(), 1);
}

#[tokio::test]
async fn unknown_project_fails() {
  let build = TestBuild::new(&["zlib"]);
  let orch = build.orchestrator(MockLoader::new());

  let err = orch.build("ghost").await.unwrap_err();
  assert!(matches!(&*err, BuildError::Mapping(MappingError::UnknownProject(name)) if name == "ghost"));
}

#[tokio::test]
async fn build_all_follows_mapping_order() {
  let build = TestBuild::new(&["zlib", "openssl", "curl"]);
  let orch = build.orchestrator(MockLoader::new());

  let report = orch.build_all_report().await.unwrap();
  assert_eq!(report.succeeded, vec!["zlib", "openssl", "curl"]);
  assert!(orch.build_all().await.unwrap());
}

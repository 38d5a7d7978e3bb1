use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use todoscope::buffer::{Buffer, BufferList};
use todoscope::config::{Config, NarrowConfig};
use todoscope::orchestrator::{
    ClearTarget, DirectoryTarget, Notice, Orchestrator, PickKind, Reaction,
};
use todoscope::project::{MarkerResolver, ProjectResolver};
use todoscope::search::{DirectorySearcher, RunFailure, RunOutcome, SearchEvent};
use todoscope::types::{Candidate, JumpTarget, Location};

struct FakeSearcher {
    delay: Duration,
    fail: bool,
    launches: Arc<AtomicUsize>,
}

impl DirectorySearcher for FakeSearcher {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn search(&self, directory: PathBuf) -> BoxFuture<'static, RunOutcome> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let fail = self.fail;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(RunFailure::new("exit status: 2"));
            }
            Ok(vec![Candidate {
                source_name: "lib.rs".into(),
                line_number: 4,
                keyword_type: "TODO".into(),
                location: Location::File {
                    path: directory.join("lib.rs"),
                    line: 4,
                    column: 8,
                },
                narrow_key: Some('t'),
                excerpt: "fix this".into(),
            }])
        })
    }
}

struct Setup {
    orch: Orchestrator,
    events: UnboundedReceiver<SearchEvent>,
    launches: Arc<AtomicUsize>,
    dir: TempDir,
}

impl Setup {
    fn new(delay_secs: u64, fail: bool) -> Self {
        let launches = Arc::new(AtomicUsize::new(0));
        let searcher = Arc::new(FakeSearcher {
            delay: Duration::from_secs(delay_secs),
            fail,
            launches: Arc::clone(&launches),
        });
        let resolver = Box::new(MarkerResolver::new(vec![".git".into()]));
        let (orch, events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "//! lib\n\nfn a() {\n    // TODO: fix this\n}\n",
        )
        .unwrap();
        Self {
            orch,
            events,
            launches,
            dir,
        }
    }

    fn directory(&self) -> String {
        self.dir.path().canonicalize().unwrap().display().to_string()
    }

    fn target(&self) -> DirectoryTarget {
        DirectoryTarget::explicit(self.dir.path())
    }

    async fn next_reaction(&mut self) -> Option<Reaction> {
        let event = self.events.recv().await.unwrap();
        self.orch.handle_event(event)
    }
}

#[tokio::test(start_paused = true)]
async fn fast_search_shows_results_and_leaves_cache_empty() {
    let mut s = Setup::new(1, false);

    let target = s.target();
    let started = s.orch.search_directory(&target).unwrap();
    assert!(matches!(started, Reaction::Pending { ref directory } if *directory == s.directory()));
    assert!(s.orch.is_searching());

    match s.next_reaction().await {
        Some(Reaction::Show(request)) => {
            assert_eq!(request.kind, PickKind::Directory(s.directory()));
            assert_eq!(request.candidates.len(), 1);
            assert_eq!(request.lines[0].narrow_key, Some('t'));
            assert!(request.preview.enabled());

            let target = s.orch.jump(&request.lines[0]).unwrap();
            assert!(matches!(target, JumpTarget::File { line: 4, column: 8, .. }));
            assert_eq!(target.text(), "    // TODO: fix this");
        }
        other => panic!("unexpected reaction {other:?}"),
    }
    assert!(s.orch.cache().is_empty());
    assert!(!s.orch.is_searching());
}

#[tokio::test(start_paused = true)]
async fn slow_search_caches_and_next_call_reads_cache() {
    let mut s = Setup::new(5, false);
    let directory = s.directory();

    let target = s.target();
    s.orch.search_directory(&target).unwrap();

    assert!(matches!(
        s.next_reaction().await,
        Some(Reaction::Notice(Notice::SearchSlow { .. }))
    ));
    assert_eq!(
        s.next_reaction().await.map(|r| match r {
            Reaction::Notice(n) => n,
            other => panic!("unexpected reaction {other:?}"),
        }),
        Some(Notice::CachingComplete {
            directory: directory.clone(),
            count: 1
        })
    );
    assert_eq!(s.orch.cached_directories(), vec![directory.clone()]);

    match s.orch.search_directory(&target).unwrap() {
        Reaction::Show(request) => {
            assert_eq!(request.kind, PickKind::Directory(directory));
            assert_eq!(request.candidates[0].excerpt, "fix this");
        }
        other => panic!("unexpected reaction {other:?}"),
    }
    assert_eq!(s.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_search_of_same_directory_is_coalesced() {
    let mut s = Setup::new(5, false);

    let target = s.target();
    s.orch.search_directory(&target).unwrap();
    assert!(matches!(
        s.orch.search_directory(&target).unwrap(),
        Reaction::Notice(Notice::AlreadyRunning { .. })
    ));
    assert_eq!(s.launches.load(Ordering::SeqCst), 1);

    // slow notice, then caching
    s.next_reaction().await;
    s.next_reaction().await;
    assert!(!s.orch.is_searching());
}

#[tokio::test(start_paused = true)]
async fn failed_search_is_silent() {
    let mut s = Setup::new(0, true);

    let target = s.target();
    s.orch.search_directory(&target).unwrap();
    assert!(s.next_reaction().await.is_none());
    assert!(!s.orch.is_searching());
    assert!(s.orch.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clear_cache_removes_one_or_all() {
    let mut s = Setup::new(5, false);
    let other = TempDir::new().unwrap();

    for target in [s.target(), DirectoryTarget::explicit(other.path())] {
        s.orch.search_directory(&target).unwrap();
        s.next_reaction().await;
        s.next_reaction().await;
    }
    assert_eq!(s.orch.cache().len(), 2);

    let first = s.orch.cached_directories()[0].clone();
    assert_eq!(
        s.orch.clear_cache(ClearTarget::One(first.clone())),
        Notice::CacheCleared { removed: 1 }
    );
    assert!(s.orch.cache().get(&first).is_none());
    assert_eq!(s.orch.cache().len(), 1);

    assert_eq!(
        s.orch.clear_cache(ClearTarget::All),
        Notice::CacheCleared { removed: 1 }
    );
    assert_eq!(s.orch.clear_cache(ClearTarget::All), Notice::CacheEmpty);
}

#[test]
fn directory_target_precedence() {
    struct Fixed(PathBuf);

    impl ProjectResolver for Fixed {
        fn project_root(&self, _start: &Path) -> Option<PathBuf> {
            Some(self.0.clone())
        }
    }

    let explicit = TempDir::new().unwrap();
    let prompted = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let fallback = TempDir::new().unwrap();
    let canonical = |d: &TempDir| d.path().canonicalize().unwrap().display().to_string();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();
    rt.block_on(async {
        let launches = Arc::new(AtomicUsize::new(0));
        let searcher = Arc::new(FakeSearcher {
            delay: Duration::from_secs(60),
            fail: false,
            launches,
        });
        let resolver = Box::new(Fixed(root.path().to_path_buf()));
        let (mut orch, _events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

        let pending = |r: Reaction| match r {
            Reaction::Pending { directory } => directory,
            other => panic!("unexpected reaction {other:?}"),
        };

        let all = DirectoryTarget {
            explicit: Some(explicit.path().to_path_buf()),
            prompted: Some(prompted.path().to_path_buf()),
            default_dir: fallback.path().to_path_buf(),
        };
        assert_eq!(pending(orch.search_directory(&all).unwrap()), canonical(&explicit));

        let no_explicit = DirectoryTarget {
            explicit: None,
            ..all.clone()
        };
        assert_eq!(
            pending(orch.search_directory(&no_explicit).unwrap()),
            canonical(&prompted)
        );

        let default_only = DirectoryTarget::from_default(fallback.path());
        assert_eq!(
            pending(orch.search_directory(&default_only).unwrap()),
            canonical(&root)
        );
    });
}

#[tokio::test]
async fn project_search_without_project_uses_start_directory() {
    let launches = Arc::new(AtomicUsize::new(0));
    let searcher = Arc::new(FakeSearcher {
        delay: Duration::from_millis(10),
        fail: false,
        launches,
    });
    let resolver = Box::new(MarkerResolver::new(vec![
        "todoscope-marker-that-does-not-exist".into(),
    ]));
    let (mut orch, _events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("main.rs");
    std::fs::write(&file, "fn main() {}\n").unwrap();

    match orch.search_project(&file).unwrap() {
        Reaction::Pending { directory } => {
            assert_eq!(directory, dir.path().canonicalize().unwrap().display().to_string());
        }
        other => panic!("unexpected reaction {other:?}"),
    }
}

#[test]
fn buffer_search_uses_live_markers() {
    let resolver = Box::new(MarkerResolver::new(vec![]));
    let searcher = Arc::new(FakeSearcher {
        delay: Duration::ZERO,
        fail: false,
        launches: Arc::new(AtomicUsize::new(0)),
    });
    let (orch, _events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

    let mut buffers = BufferList::new();
    let buffer = Buffer::new("a.rs", "fn a() {}\n// TODO: fix this\n// BUG: crash\n");
    buffers.add(buffer.clone());

    let request = match orch.search_current_buffer(&buffers).unwrap() {
        Reaction::Show(request) => request,
        other => panic!("unexpected reaction {other:?}"),
    };
    assert_eq!(request.kind, PickKind::Buffer);
    assert_eq!(
        request.lines.iter().map(|l| l.narrow_key).collect::<Vec<_>>(),
        vec![Some('t'), Some('b')]
    );

    buffer.insert(0, "// header\n");
    let target = orch.jump(&request.lines[1]).unwrap();
    assert_eq!(target.to_string(), "a.rs:4:4");
    assert_eq!(target.text(), "// BUG: crash");
}

#[test]
fn reconfigure_recomputes_narrow_groups() {
    let resolver = Box::new(MarkerResolver::new(vec![]));
    let searcher = Arc::new(FakeSearcher {
        delay: Duration::ZERO,
        fail: false,
        launches: Arc::new(AtomicUsize::new(0)),
    });
    let (mut orch, _events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

    let mut buffers = BufferList::new();
    buffers.add(Buffer::new("a.rs", "// NOTE: remember\n"));

    let key = |reaction: Reaction| match reaction {
        Reaction::Show(request) => request.lines[0].narrow_key,
        other => panic!("unexpected reaction {other:?}"),
    };
    assert_eq!(key(orch.search_current_buffer(&buffers).unwrap()), Some('.'));

    let mut config = Config::default();
    config.narrow = NarrowConfig {
        keys: vec![("n".into(), "NOTE".into())],
        ..NarrowConfig::default()
    };
    orch.reconfigure(config).unwrap();
    assert_eq!(key(orch.search_current_buffer(&buffers).unwrap()), Some('n'));
}

#[test]
fn rejected_reconfigure_keeps_previous_configuration() {
    let resolver = Box::new(MarkerResolver::new(vec![]));
    let searcher = Arc::new(FakeSearcher {
        delay: Duration::ZERO,
        fail: false,
        launches: Arc::new(AtomicUsize::new(0)),
    });
    let (mut orch, _events) = Orchestrator::new(Config::default(), searcher, resolver).unwrap();

    let mut buffers = BufferList::new();
    buffers.add(Buffer::new("a.rs", "// TODO: keep\n"));

    let mut conflicting = Config::default();
    conflicting.keywords.punctuation = "!".into();
    conflicting.narrow.other = ("t".into(), "OTHER".into());
    assert!(orch.reconfigure(conflicting).is_err());

    assert_eq!(orch.config().keywords.punctuation, ":");
    assert_eq!(orch.config().narrow.other.0, ".");
    assert_eq!(orch.searcher_name(), "fake");
    match orch.search_current_buffer(&buffers).unwrap() {
        Reaction::Show(request) => {
            assert_eq!(request.lines[0].narrow_key, Some('t'));
            assert_eq!(request.candidates[0].excerpt, "keep");
        }
        other => panic!("unexpected reaction {other:?}"),
    }
}

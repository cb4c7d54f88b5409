//! End-to-end shutdown flows across config, coordinators and the signal manager.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use graceful::{
    ConfigError, CoordinatorState, ErrorFn, Shutdown, ShutdownError, ShutdownHandle,
    ShutdownManager, ShutdownMode, SIGNAL_MANAGER_NAME,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("graceful=debug")
        .with_test_writer()
        .try_init();
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn collecting_handler(shutdown: &Shutdown) -> Arc<Mutex<Vec<String>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    shutdown.set_error_handler(Arc::new(ErrorFn::new(move |err: ShutdownError| {
        sink.lock().push(err.to_string());
    })));
    errors
}

async fn finished(shutdown: &Shutdown) -> bool {
    tokio::time::timeout(Duration::from_secs(5), shutdown.wait_finished())
        .await
        .is_ok()
}

/// Manager driven by test code, standing in for an admin command.
struct AdminManager {
    name: String,
    handle: Mutex<Option<ShutdownHandle>>,
    fail_start: bool,
}

impl AdminManager {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            handle: Mutex::new(None),
            fail_start: false,
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            handle: Mutex::new(None),
            fail_start: true,
        })
    }

    async fn trigger(&self) {
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle.begin_shutdown().await;
        }
    }
}

#[async_trait::async_trait]
impl ShutdownManager for AdminManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, handle: ShutdownHandle) -> Result<(), ShutdownError> {
        if self.fail_start {
            return Err(ShutdownError::ManagerStart {
                manager: self.name.clone(),
                reason: "port in use".to_string(),
            });
        }
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    async fn on_shutdown_begin(&self) -> Result<(), ShutdownError> {
        Ok(())
    }

    async fn on_shutdown_end(&self) -> Result<(), ShutdownError> {
        Err(ShutdownError::Hook {
            manager: self.name.clone(),
            reason: "listener already closed".to_string(),
        })
    }
}

#[tokio::test]
async fn test_config_driven_concurrent_flow() {
    init_tracing();
    let file = write_config(
        r#"
[coordinator]
name = "api"
mode = "concurrent_barrier"

[signal]
signals = ["user1"]
exit_on_finish = false
"#,
    );

    let (shutdown, signals) = Shutdown::from_path(file.path()).unwrap();
    assert_eq!(shutdown.mode(), ShutdownMode::ConcurrentBarrier);
    let errors = collecting_handler(&shutdown);

    let names = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let names = names.clone();
        shutdown.add_callback_fn(move |manager| {
            let names = names.clone();
            async move {
                names.lock().push(manager);
                if i == 2 {
                    return Err(ShutdownError::callback("cache flush failed"));
                }
                Ok(())
            }
        });
    }

    shutdown.start().await.unwrap();
    signals.request_shutdown();

    assert!(finished(&shutdown).await);
    assert_eq!(shutdown.state(), CoordinatorState::Completed);
    assert_eq!(shutdown.trigger_name().as_deref(), Some(SIGNAL_MANAGER_NAME));
    assert_eq!(names.lock().len(), 5);
    assert!(names.lock().iter().all(|n| n == SIGNAL_MANAGER_NAME));
    assert_eq!(errors.lock().as_slice(), ["Shutdown callback failed: cache flush failed"]);
}

#[tokio::test]
async fn test_config_driven_sequential_flow() {
    init_tracing();
    let file = write_config(
        r#"
[coordinator]
name = "worker"
mode = "sequential_on_cancel"

[signal]
signals = ["user1"]
exit_on_finish = false
"#,
    );

    let (shutdown, signals) = Shutdown::from_path(file.path()).unwrap();
    assert_eq!(shutdown.mode(), ShutdownMode::SequentialOnCancel);

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let order = order.clone();
        shutdown.add_callback_fn(move |_| {
            let order = order.clone();
            async move {
                order.lock().push(i);
                Ok::<(), ShutdownError>(())
            }
        });
    }

    shutdown.start().await.unwrap();
    signals.request_shutdown();
    signals.request_shutdown();

    assert!(finished(&shutdown).await);
    assert_eq!(order.lock().as_slice(), [0, 1, 2]);
    assert_eq!(shutdown.trigger_name().as_deref(), Some(SIGNAL_MANAGER_NAME));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let file = write_config(
        r#"
[coordinator]
name = ""
"#,
    );

    let result = Shutdown::from_path(file.path());
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "coordinator.name"
    ));
}

#[tokio::test]
async fn test_admin_manager_trigger_reports_hook_error() {
    init_tracing();
    let shutdown = Shutdown::new(ShutdownMode::ConcurrentBarrier);
    let errors = collecting_handler(&shutdown);
    let admin = AdminManager::new("admin");
    shutdown.add_manager(admin.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    shutdown.add_callback_fn(move |manager| {
        let counter = counter.clone();
        async move {
            assert_eq!(manager, "admin");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), ShutdownError>(())
        }
    });

    shutdown.start().await.unwrap();
    admin.trigger().await;

    // The concurrent coordinator has finished by the time the trigger returns.
    assert_eq!(shutdown.state(), CoordinatorState::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("listener already closed"));

    // Guarded: a second trigger is a no-op.
    admin.trigger().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_manager_aborts_start() {
    let shutdown = Shutdown::new(ShutdownMode::SequentialOnCancel);
    let first = AdminManager::new("first");
    shutdown.add_manager(first.clone());
    shutdown.add_manager(AdminManager::failing("second"));

    let err = shutdown.start().await.unwrap_err();
    assert!(matches!(err, ShutdownError::ManagerStart { ref manager, .. } if manager == "second"));
    assert!(first.handle.lock().is_some());
    assert_eq!(shutdown.state(), CoordinatorState::Running);
}

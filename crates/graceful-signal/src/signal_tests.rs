
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use graceful_core::{CoordinatorState, GracefulShutdown, SequentialShutdown};

    fn manager() -> Arc<SignalManager> {
        Arc::new(SignalManager::default().with_exit_on_finish(false))
    }

    async fn finished_within(coordinator: &GracefulShutdown, secs: u64) -> bool {
        tokio::time::timeout(Duration::from_secs(secs), coordinator.wait_finished())
            .await
            .is_ok()
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            SignalEvent::Received(TerminationSignal::Terminate).to_string(),
            "SIGTERM"
        );
        assert_eq!(SignalEvent::Requested.to_string(), "REQUESTED");
    }

    #[test]
    fn test_new_empty_uses_defaults() {
        let manager = SignalManager::new(Vec::new());
        assert_eq!(manager.signals(), TerminationSignal::defaults().as_slice());
        assert!(!manager.is_shutdown_requested());
        assert_eq!(manager.name(), SIGNAL_MANAGER_NAME);
    }

    #[test]
    fn test_from_config() {
        let config = SignalConfig {
            signals: vec![TerminationSignal::Hangup],
            exit_code: 3,
            exit_on_finish: false,
        };
        let manager = SignalManager::from_config(&config);
        assert_eq!(manager.signals(), &[TerminationSignal::Hangup]);
        assert_eq!(manager.exit_code, 3);
        assert!(!manager.exit_on_finish);
    }

    #[tokio::test]
    async fn test_request_shutdown_broadcasts() {
        let manager = SignalManager::default();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.request_shutdown();

        assert!(manager.is_shutdown_requested());
        assert_eq!(rx1.recv().await.unwrap(), SignalEvent::Requested);
        assert_eq!(rx2.recv().await.unwrap(), SignalEvent::Requested);
    }

    #[tokio::test]
    async fn test_request_triggers_coordinator() {
        let coordinator = GracefulShutdown::new();
        let signals = manager();
        coordinator.add_manager(signals.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for _ in 0..3 {
            let calls = calls.clone();
            let names = names.clone();
            coordinator.add_callback_fn(move |name| {
                let calls = calls.clone();
                let names = names.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    names.lock().push(name);
                    Ok::<(), ShutdownError>(())
                }
            });
        }

        coordinator.start().await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Running);

        signals.request_shutdown();
        assert!(finished_within(&coordinator, 5).await);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(names.lock().iter().all(|n| n == SIGNAL_MANAGER_NAME));
        assert_eq!(coordinator.trigger_name().as_deref(), Some(SIGNAL_MANAGER_NAME));
        assert_eq!(coordinator.state(), CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn test_request_before_start_fires_on_start() {
        let coordinator = GracefulShutdown::new();
        let signals = manager();
        coordinator.add_manager(signals.clone());

        signals.request_shutdown();
        coordinator.start().await.unwrap();

        assert!(finished_within(&coordinator, 5).await);
        assert_eq!(coordinator.state(), CoordinatorState::Completed);
    }

    #[tokio::test]
    async fn test_request_triggers_sequential_coordinator() {
        let coordinator = SequentialShutdown::new("seq");
        let signals = manager();
        coordinator.add_manager(signals.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        coordinator.add_callback_fn(move |_name| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ShutdownError>(())
            }
        });

        coordinator.start().await.unwrap();
        signals.request_shutdown();

        let finished = tokio::time::timeout(Duration::from_secs(5), coordinator.wait_finished()).await;
        assert!(finished.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.trigger_name().as_deref(), Some(SIGNAL_MANAGER_NAME));
    }

    #[tokio::test]
    async fn test_hooks_without_exit() {
        let manager = SignalManager::default().with_exit_on_finish(false);
        assert!(manager.on_shutdown_begin().await.is_ok());
        assert!(manager.on_shutdown_end().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_os_signal_triggers_shutdown() {
        let coordinator = GracefulShutdown::new();
        let signals = Arc::new(
            SignalManager::new(vec![TerminationSignal::User2]).with_exit_on_finish(false),
        );
        let mut events = signals.subscribe();
        coordinator.add_manager(signals.clone());
        coordinator.start().await.unwrap();

        send_signal(std::process::id(), TerminationSignal::User2).unwrap();

        assert!(finished_within(&coordinator, 5).await);
        assert!(signals.is_shutdown_requested());
        assert_eq!(
            events.recv().await.unwrap(),
            SignalEvent::Received(TerminationSignal::User2)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_send_signal_rejects_invalid_pid() {
        assert!(send_signal(0, TerminationSignal::Terminate).is_err());
        assert!(send_signal(u32::MAX, TerminationSignal::Terminate).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_send_signal_missing_process() {
        let result = send_signal(2_000_000_000, TerminationSignal::User1);
        assert!(matches!(result, Err(ShutdownError::Custom(_))));
    }

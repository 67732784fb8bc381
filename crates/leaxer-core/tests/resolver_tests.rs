//! Integration tests for backend resolution against simulated hardware.

use leaxer_core::backend::CacheKeys;
use leaxer_core::{
    BackendKind, BackendResolver, DetectionCache, GpuDevice, GpuVendor, HardwareProbes,
    LeaxerError, MemorySettings, Platform, Probe, Result,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

/// Probes whose answers can be flipped while counting invocations.
#[derive(Default)]
struct FakeProbes {
    present: Mutex<HashMap<Probe, bool>>,
    calls: Mutex<HashMap<Probe, usize>>,
    list_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeProbes {
    fn with(probes: &[Probe]) -> Self {
        let fake = Self::default();
        for probe in probes {
            fake.set(*probe, true);
        }
        fake
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn set(&self, probe: Probe, present: bool) {
        self.present.lock().unwrap().insert(probe, present);
    }

    fn calls(&self, probe: Probe) -> usize {
        self.calls.lock().unwrap().get(&probe).copied().unwrap_or(0)
    }
}

impl HardwareProbes for FakeProbes {
    fn detect(&self, probe: Probe) -> Result<bool> {
        *self.calls.lock().unwrap().entry(probe).or_default() += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        match self.present.lock().unwrap().get(&probe) {
            Some(found) => Ok(*found),
            None => Err(LeaxerError::probe(probe.cache_key(), "tool not installed")),
        }
    }

    fn list_devices(&self, vendor: GpuVendor) -> Result<Vec<GpuDevice>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match vendor {
            GpuVendor::Nvidia => Ok(vec![GpuDevice {
                name: "NVIDIA GeForce RTX 4090".into(),
                memory: "24564 MiB".into(),
            }]),
            GpuVendor::Amd => Err(LeaxerError::probe("amd_info", "rocm-smi crashed")),
            GpuVendor::Apple => Ok(vec![GpuDevice {
                name: "Apple M3 Max".into(),
                memory: "64 GB unified".into(),
            }]),
        }
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber in scope and return what it logged.
fn captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = SharedBuf::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let value = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
    (value, text)
}

fn warnings(logs: &str) -> Vec<&str> {
    logs.lines().filter(|line| line.contains("WARN")).collect()
}

fn resolver(
    platform: Platform,
    probes: Arc<FakeProbes>,
    settings: Arc<MemorySettings>,
) -> BackendResolver {
    BackendResolver::new(platform, probes, settings, Arc::new(DetectionCache::new()))
}

const PLATFORMS: [Platform; 3] = [Platform::Linux, Platform::Windows, Platform::MacOs];

#[test]
fn test_unknown_names_are_never_available() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda, Probe::Rocm]));
    let r = resolver(Platform::Linux, probes, Arc::new(MemorySettings::new()));

    for name in ["", "vulkan", "CUDA", "gpu", "auto", "cuda ", "opencl"] {
        assert!(!r.backend_available(name), "{:?} should not be available", name);
    }
    assert!(r.backend_available("cuda"));
    assert!(r.backend_available("rocm"));
    assert!(r.backend_available("cpu"));
}

#[test]
fn test_cpu_is_always_first() {
    let all = [Probe::Cuda, Probe::Rocm, Probe::DirectMl, Probe::AppleSilicon];
    for platform in PLATFORMS {
        for probes in [FakeProbes::default(), FakeProbes::with(&all)] {
            let r = resolver(platform, Arc::new(probes), Arc::new(MemorySettings::new()));
            let backends = r.available_backends();
            assert_eq!(backends.first(), Some(&BackendKind::Cpu), "{}", platform);
            assert_eq!(
                backends.iter().filter(|b| **b == BackendKind::Cpu).count(),
                1
            );
        }
    }
}

#[test]
fn test_platform_backend_order() {
    let all = [Probe::Cuda, Probe::Rocm, Probe::DirectMl, Probe::AppleSilicon];
    let expected = [
        (
            Platform::Linux,
            vec![BackendKind::Cpu, BackendKind::Cuda, BackendKind::Rocm],
        ),
        (
            Platform::Windows,
            vec![BackendKind::Cpu, BackendKind::Cuda, BackendKind::DirectMl],
        ),
        (Platform::MacOs, vec![BackendKind::Cpu, BackendKind::Metal]),
    ];

    for (platform, backends) in expected {
        let probes = Arc::new(FakeProbes::with(&all));
        let r = resolver(platform, probes.clone(), Arc::new(MemorySettings::new()));
        assert_eq!(r.available_backends(), backends);
    }
}

#[test]
fn test_macos_never_probes_cuda() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda, Probe::AppleSilicon]));
    let r = resolver(Platform::MacOs, probes.clone(), Arc::new(MemorySettings::new()));

    assert_eq!(r.available_backends(), vec![BackendKind::Cpu, BackendKind::Metal]);
    r.gpu_info();
    assert_eq!(probes.calls(Probe::Cuda), 0);
    assert_eq!(probes.calls(Probe::Rocm), 0);
    assert_eq!(probes.calls(Probe::DirectMl), 0);
}

#[test]
fn test_no_accelerators_always_cpu() {
    for platform in PLATFORMS {
        for preference in [None, Some("auto"), Some("cuda"), Some("metal"), Some("bogus")] {
            let settings = Arc::new(MemorySettings::new());
            if let Some(value) = preference {
                settings.set("compute_backend", value);
            }
            let r = resolver(platform, Arc::new(FakeProbes::default()), settings);
            assert_eq!(r.get_backend(), BackendKind::Cpu, "{} {:?}", platform, preference);
        }
    }
}

#[test]
fn test_cuda_preference_then_fallback_after_clear() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda, Probe::Rocm]));
    let settings = Arc::new(MemorySettings::with("compute_backend", "cuda"));
    let r = resolver(Platform::Linux, probes.clone(), settings);

    assert_eq!(r.get_backend(), BackendKind::Cuda);

    probes.set(Probe::Cuda, false);
    // Still cached.
    assert_eq!(r.get_backend(), BackendKind::Cuda);

    r.clear_cache();
    assert_eq!(r.get_backend(), BackendKind::Rocm);
}

#[test]
fn test_auto_priority_order() {
    // DirectML is only preferred when CUDA is absent.
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda, Probe::DirectMl]));
    let r = resolver(Platform::Windows, probes.clone(), Arc::new(MemorySettings::new()));
    assert_eq!(r.get_backend(), BackendKind::Cuda);

    probes.set(Probe::Cuda, false);
    r.clear_cache();
    assert_eq!(r.get_backend(), BackendKind::DirectMl);

    // An explicit, available lower-priority choice is honored.
    probes.set(Probe::Cuda, true);
    r.clear_cache();
    assert_eq!(r.resolve_backend("directml"), BackendKind::DirectMl);
    assert_eq!(r.resolve_backend("cpu"), BackendKind::Cpu);
}

#[test]
fn test_available_backends_is_cached() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda]));
    let r = resolver(Platform::Linux, probes.clone(), Arc::new(MemorySettings::new()));

    let first = r.available_backends();
    probes.set(Probe::Cuda, false);
    probes.set(Probe::Rocm, true);
    let second = r.available_backends();

    assert_eq!(first, second);
    assert_eq!(probes.calls(Probe::Cuda), 1);
    assert_eq!(probes.calls(Probe::Rocm), 1);
}

#[test]
fn test_clear_cache_reprobes() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda]));
    let r = resolver(Platform::Linux, probes.clone(), Arc::new(MemorySettings::new()));

    r.available_backends();
    r.available_backends();
    assert_eq!(probes.calls(Probe::Cuda), 1);

    r.clear_cache();
    assert!(r.cache().is_empty());
    r.available_backends();
    assert_eq!(probes.calls(Probe::Cuda), 2);
}

#[test]
fn test_scenario_linux_auto_with_cuda() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda]));
    let r = resolver(Platform::Linux, probes, Arc::new(MemorySettings::new()));
    assert_eq!(r.get_backend(), BackendKind::Cuda);
    assert_eq!(r.get_backend().as_str(), "cuda");
}

#[test]
fn test_scenario_metal_preference_on_linux() {
    let probes = Arc::new(FakeProbes::default());
    let settings = Arc::new(MemorySettings::with("compute_backend", "metal"));
    let r = resolver(Platform::Linux, probes.clone(), settings);

    assert_eq!(r.get_backend(), BackendKind::Cpu);
    assert_eq!(probes.calls(Probe::AppleSilicon), 0);
}

#[test]
fn test_unavailable_preference_logs_fallback_warning() {
    let r = resolver(
        Platform::Linux,
        Arc::new(FakeProbes::default()),
        Arc::new(MemorySettings::with("compute_backend", "metal")),
    );

    let (backend, logs) = captured_logs(|| r.get_backend());
    assert_eq!(backend, BackendKind::Cpu);

    let warned = warnings(&logs);
    assert_eq!(warned.len(), 1, "logs: {}", logs);
    assert!(warned[0].contains("Preferred backend metal is not available"));
    assert!(warned[0].contains("falling back to cpu"));
    assert!(!logs.contains("Invalid compute_backend"));
}

#[test]
fn test_invalid_preference_logs_distinct_warning() {
    let r = resolver(
        Platform::Linux,
        Arc::new(FakeProbes::with(&[Probe::Cuda])),
        Arc::new(MemorySettings::with("compute_backend", "vulkan")),
    );

    let (backend, logs) = captured_logs(|| r.get_backend());
    assert_eq!(backend, BackendKind::Cuda);

    let warned = warnings(&logs);
    assert_eq!(warned.len(), 1, "logs: {}", logs);
    assert!(warned[0].contains("Invalid compute_backend setting 'vulkan'"));
    assert!(warned[0].contains("using cuda"));
    assert!(!logs.contains("is not available"));
}

#[test]
fn test_available_preference_logs_no_warning() {
    let r = resolver(
        Platform::Linux,
        Arc::new(FakeProbes::with(&[Probe::Cuda])),
        Arc::new(MemorySettings::with("compute_backend", "cuda")),
    );

    let (backend, logs) = captured_logs(|| r.get_backend());
    assert_eq!(backend, BackendKind::Cuda);
    assert!(warnings(&logs).is_empty(), "logs: {}", logs);
}

#[test]
fn test_scenario_concurrent_queries_probe_once() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda]).slow(Duration::from_millis(50)));
    let r = Arc::new(resolver(
        Platform::Linux,
        probes.clone(),
        Arc::new(MemorySettings::new()),
    ));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let r = Arc::clone(&r);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                r.available_backends()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], results[1]);
    assert_eq!(probes.calls(Probe::Cuda), 1);
    assert_eq!(probes.calls(Probe::Rocm), 1);
}

#[test]
fn test_gpu_info_is_fail_soft_per_vendor() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda, Probe::Rocm]));
    let r = resolver(Platform::Linux, probes.clone(), Arc::new(MemorySettings::new()));

    let info = r.gpu_info();
    let nvidia = info.nvidia.as_ref().unwrap();
    assert!(nvidia.available);
    assert_eq!(nvidia.devices[0].memory, "24564 MiB");

    // Listing failed even though rocm-smi answered the version query.
    let amd = info.amd.as_ref().unwrap();
    assert!(!amd.available);
    assert!(amd.devices.is_empty());
    assert!(info.apple.is_none());

    // Vendor entries are cached independently of available_backends.
    assert!(r.cache().contains(CacheKeys::NVIDIA_INFO));
    assert!(!r.cache().contains(CacheKeys::AVAILABLE_BACKENDS));
    r.gpu_info();
    assert_eq!(probes.list_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_gpu_info_apple() {
    let probes = Arc::new(FakeProbes::with(&[Probe::AppleSilicon]));
    let r = resolver(Platform::MacOs, probes, Arc::new(MemorySettings::new()));

    let info = r.gpu_info();
    assert_eq!(info.platform, "macos");
    assert!(info.nvidia.is_none());
    assert_eq!(info.apple.unwrap().devices[0].name, "Apple M3 Max");
}

#[test]
fn test_valid_backends() {
    let r = resolver(
        Platform::Linux,
        Arc::new(FakeProbes::default()),
        Arc::new(MemorySettings::new()),
    );
    assert_eq!(
        r.valid_backends(),
        &["auto", "cpu", "cuda", "metal", "directml", "rocm"]
    );
}

#[tokio::test]
async fn test_prewarm_populates_cache() {
    let probes = Arc::new(FakeProbes::with(&[Probe::Cuda]));
    let r = Arc::new(resolver(
        Platform::Linux,
        probes.clone(),
        Arc::new(MemorySettings::new()),
    ));

    r.prewarm().await;
    assert!(r.cache().contains(CacheKeys::AVAILABLE_BACKENDS));
    assert!(r.cache().contains(CacheKeys::NVIDIA_INFO));

    assert_eq!(r.get_backend(), BackendKind::Cuda);
    assert_eq!(probes.calls(Probe::Cuda), 1);
}

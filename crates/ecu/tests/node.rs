//! Front/back node pairs supervising each other over a simulated segment.

use canbus::{Address, CanDriver, CanError, CanFrame, DriverError, RxInterrupt, SimBus, SimDriver};
use ecu::{EcuConfig, EcuError, EcuNode, HeartbeatRole};
use heartbeat::{BeatStatus, LivenessLed};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("config")
        .join(name)
}

fn led() -> Arc<LivenessLed> {
    Arc::new(LivenessLed::disabled())
}

#[test]
fn test_shipped_configs_load() {
    let back = EcuConfig::load(Some(&config_file("back.toml"))).unwrap();
    let front = EcuConfig::load(Some(&config_file("front.toml"))).unwrap();

    assert_eq!(back.node.name, "back");
    assert_eq!(front.node.name, "front");
    assert_eq!(back.can.addresses.len(), 3);
    assert_eq!(front.heartbeat, back.heartbeat);
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(EcuConfig::load(Some(&config_file("does-not-exist.toml"))).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_roles_follow_heartbeat_direction() {
    let sim = SimBus::new();
    let back = EcuConfig::load(Some(&config_file("back.toml"))).unwrap();
    let front = EcuConfig::load(Some(&config_file("front.toml"))).unwrap();

    let back = EcuNode::new(&back, sim.attach(), led()).unwrap();
    let front = EcuNode::new(&front, sim.attach(), led()).unwrap();

    assert_eq!(back.role(), HeartbeatRole::Receive);
    assert_eq!(front.role(), HeartbeatRole::Transmit);
}

#[tokio::test(start_paused = true)]
async fn test_back_sees_front_then_detects_silence() {
    let sim = SimBus::new();
    let back_config = EcuConfig::default();
    let front_config = back_config.mirrored("front");

    let mut back = EcuNode::new(&back_config, sim.attach(), led()).unwrap();
    let mut front = EcuNode::new(&front_config, sim.attach(), led()).unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    assert!(front.add_tick(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    back.start().unwrap();
    front.start().unwrap();

    assert_eq!(back.run_for(Duration::from_millis(1000)).await, Some(BeatStatus::Alive));
    assert_eq!(front.poll(), None);
    assert!(back.heartbeat().receiver().beats() >= 9);
    assert!(ticks.load(Ordering::SeqCst) >= 9);

    front.stop();
    assert_eq!(back.run_for(Duration::from_millis(300)).await, Some(BeatStatus::Stale));
}

#[tokio::test(start_paused = true)]
async fn test_polled_mode_still_delivers() {
    let sim = SimBus::new();
    let mut config = EcuConfig::from_toml_str(
        r#"
        [can]
        interrupts = false

        [[can.addresses]]
        address = 0x001
        direction = "incoming"

        [[can.addresses]]
        address = 0x100
        direction = "incoming"
        "#,
    )
    .unwrap();
    config.node.name = "polled".to_string();

    let mut node = EcuNode::new(&config, sim.attach(), led()).unwrap();
    node.start().unwrap();
    assert!(!node.canbus().interrupts_enabled());

    sim.inject(CanFrame::new(0x100, [1, 2, 3, 4, 5, 6, 7, 8]));
    sim.inject(CanFrame::new(0x001, [0; 8]));
    node.poll();

    assert_eq!(node.canbus().get_data(0x100), Ok([1, 2, 3, 4, 5, 6, 7, 8]));
    assert_eq!(node.heartbeat().receiver().beats(), 1);
    assert_eq!(node.stats().received, 2);
}

/// Simulated controller whose first initialization fails
struct FlakyDriver {
    inner: SimDriver,
    fail_begin: AtomicBool,
}

impl CanDriver for FlakyDriver {
    fn begin(&self, filters: &[Address]) -> Result<(), DriverError> {
        if self.fail_begin.swap(false, Ordering::SeqCst) {
            return Err(DriverError::Init("controller not responding".to_string()));
        }
        self.inner.begin(filters)
    }

    fn attach_interrupt(&self, isr: RxInterrupt) {
        self.inner.attach_interrupt(isr);
    }

    fn set_interrupts(&self, enable: bool) {
        self.inner.set_interrupts(enable);
    }

    fn read(&self) -> Option<CanFrame> {
        self.inner.read()
    }

    fn write(&self, frame: &CanFrame) -> Result<(), DriverError> {
        self.inner.write(frame)
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_can_be_retried_after_driver_failure() {
    let sim = SimBus::new();
    let driver = FlakyDriver {
        inner: sim.attach(),
        fail_begin: AtomicBool::new(true),
    };
    let mut node = EcuNode::new(&EcuConfig::default(), driver, led()).unwrap();

    assert!(matches!(
        node.start(),
        Err(EcuError::Can(CanError::Driver(DriverError::Init(_))))
    ));
    node.start().unwrap();
    assert!(matches!(node.start(), Err(EcuError::Can(CanError::AlreadySetup))));

    sim.inject(CanFrame::new(0x001, [0; 8]));
    assert_eq!(node.poll(), Some(BeatStatus::Alive));
    assert_eq!(node.heartbeat().receiver().beats(), 1);
}

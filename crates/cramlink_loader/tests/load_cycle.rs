//! End-to-end load sequence against a simulated FPGA on the far side
//! of the bus FIFOs.

use cramlink_engine::{BusLink, DEFAULT_FIFO_DEPTH, DevicePort, Engine};
use cramlink_hal::{CancelToken, PinMode, SimLine};
use cramlink_loader::{ConfigLoader, LoadError, LoaderPins, Phase, Timing};
use std::thread::JoinHandle;
use std::time::Duration;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Services the device side of the bus: consumes each transfer,
/// echoes one word per byte, and records transfer sizes. When
/// `raise_done_at` matches a transfer size, drives `cdone` high —
/// modeling configuration completing right after the bitstream lands.
fn spawn_fpga(
    port: DevicePort,
    cdone: SimLine,
    raise_done_at: Option<usize>,
) -> JoinHandle<Vec<usize>> {
    std::thread::spawn(move || {
        let mut sizes = Vec::new();
        while let Ok(header) = port.from_host.recv() {
            let count = (header as usize + 1) / 8;
            for _ in 0..count {
                let Ok(word) = port.from_host.recv() else {
                    return sizes;
                };
                if port.to_host.send(word >> 24).is_err() {
                    return sizes;
                }
            }
            sizes.push(count);
            if raise_done_at == Some(count) {
                cdone.drive(true);
            }
        }
        sizes
    })
}

struct Bench {
    loader: ConfigLoader,
    cs: SimLine,
    creset: SimLine,
    cdone: SimLine,
    clock_gate: SimLine,
    fpga: JoinHandle<Vec<usize>>,
}

fn bench(bitstream_len: usize, configures: bool) -> Bench {
    init_logs();
    let (link, port) = BusLink::bounded(DEFAULT_FIFO_DEPTH).unwrap();
    let cs = SimLine::new(true);
    let creset = SimLine::new(true);
    let cdone = SimLine::new(false);
    let clock_gate = SimLine::new(false);
    let raise = configures.then_some(bitstream_len);
    let fpga = spawn_fpga(port, cdone.clone(), raise);
    let engine = Engine::new(link, Box::new(cs.clone()));
    let pins = LoaderPins {
        creset: Box::new(creset.clone()),
        cdone: Box::new(cdone.clone()),
        clock_gate: Box::new(clock_gate.clone()),
    };
    let loader = ConfigLoader::new(engine, pins, Timing::default());
    Bench {
        loader,
        cs,
        creset,
        cdone,
        clock_gate,
        fpga,
    }
}

#[test]
fn successful_load_runs_the_full_sequence() {
    let image: Vec<u8> = (0..4096).map(|i| (i % 253) as u8).collect();
    let mut b = bench(image.len(), true);

    let cancel = CancelToken::with_deadline(Duration::from_secs(5));
    b.loader.load(&image, &cancel).unwrap();
    assert_eq!(b.loader.phase(), Phase::Complete);

    drop(b.loader);
    let sizes = b.fpga.join().unwrap();
    // Wake byte, the bitstream, then exactly 7 postamble bytes.
    assert_eq!(sizes, vec![1, image.len(), 7]);

    // Reset pulsed low then released.
    assert_eq!(b.creset.writes(), vec![false, true]);
    // Chip-select: deselected at attach, held low through reset, high
    // for the wake byte, low only around the upload, high after.
    assert_eq!(b.cs.writes(), vec![true, false, true, false, true]);
    assert!(b.clock_gate.level());
    assert_eq!(b.cdone.mode(), PinMode::Input);
    assert_eq!(b.creset.mode(), PinMode::Output);
}

#[test]
fn missing_done_signal_times_out_without_postamble() {
    let image = [0x5Au8; 256];
    let mut b = bench(image.len(), false);

    let cancel = CancelToken::with_deadline(Duration::from_millis(20));
    assert_eq!(b.loader.load(&image, &cancel), Err(LoadError::Timeout));
    assert_eq!(b.loader.phase(), Phase::TimedOut);

    drop(b.loader);
    let sizes = b.fpga.join().unwrap();
    assert_eq!(sizes, vec![1, image.len()]);
}

#[test]
fn explicit_cancel_is_honored_between_polls() {
    let image = [0xFFu8; 64];
    let mut b = bench(image.len(), false);

    let cancel = CancelToken::new();
    cancel.cancel();
    assert_eq!(b.loader.load(&image, &cancel), Err(LoadError::Timeout));

    drop(b.loader);
    // The upload itself is not cancellable: the device still saw the
    // wake byte and the whole bitstream.
    assert_eq!(b.fpga.join().unwrap(), vec![1, image.len()]);
}

#[test]
fn retry_after_timeout_succeeds() {
    let image = [0xC3u8; 128];
    let mut b = bench(image.len(), true);

    let expired = CancelToken::with_deadline(Duration::from_millis(0));
    // First attempt with done low and an already-expired deadline.
    b.cdone.drive(false);
    let first = b.loader.load(&image, &expired);
    // The simulated device raises done as soon as it swallows the
    // bitstream, so the first attempt may legitimately succeed or time
    // out depending on thread interleaving; a timed-out load must be
    // retryable either way.
    if first.is_err() {
        let cancel = CancelToken::with_deadline(Duration::from_secs(5));
        b.loader.load(&image, &cancel).unwrap();
    }
    assert_eq!(b.loader.phase(), Phase::Complete);
}

#[test]
fn empty_bitstream_is_an_engine_error() {
    let mut b = bench(0, false);
    let cancel = CancelToken::new();
    let err = b.loader.load(&[], &cancel).unwrap_err();
    assert!(matches!(err, LoadError::Engine(_)));
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use digiapix_rs::{Gpio, GpioMode, InterruptCallback, MockApix, RequestMode};

fn armed_line(listeners: usize) -> (MockApix, Gpio, Arc<AtomicUsize>) {
    let mock = MockApix::new();
    let gpio =
        Gpio::request(&mock, 18, GpioMode::IrqEdgeRising, RequestMode::Shared)
            .unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..listeners {
        let hits = Arc::clone(&hits);
        gpio.register_interrupt_callback(Arc::new(move || {
            hits.fetch_add(1, Ordering::Relaxed);
        }))
        .unwrap();
    }
    (mock, gpio, hits)
}

fn benchmark_dispatch_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("interrupt_fanout");
    for listeners in [1usize, 4, 16, 64] {
        let (mock, _gpio, hits) = armed_line(listeners);
        group.bench_function(format!("{listeners}_listeners"), |b| {
            b.iter(|| black_box(mock.fire_interrupt(18)))
        });
        black_box(hits.load(Ordering::Relaxed));
    }
    group.finish();
}

fn benchmark_listener_churn(c: &mut Criterion) {
    let (_mock, gpio, _hits) = armed_line(1);
    c.bench_function("register_remove", |b| {
        b.iter(|| {
            let callback: InterruptCallback = Arc::new(|| {});
            gpio.register_interrupt_callback(Arc::clone(&callback)).unwrap();
            gpio.remove_interrupt_callback(&callback).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_dispatch_fanout, benchmark_listener_churn);
criterion_main!(benches);

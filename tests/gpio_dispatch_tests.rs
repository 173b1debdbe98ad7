//! Background interrupt dispatch: listener lifecycle, native wait
//! thread start/stop ordering, fan-out and re-entrancy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use digiapix_rs::mock::{MockCall, MockGpioOp};
use digiapix_rs::{
    Gpio, GpioError, GpioMode, InterruptCallback, MockApix, RequestMode,
};

fn irq_line(mock: &MockApix, kernel_number: u32) -> Gpio {
    Gpio::request(mock, kernel_number, GpioMode::IrqEdgeRising, RequestMode::Shared)
        .unwrap()
}

fn counting_callback(hits: &Arc<AtomicUsize>) -> InterruptCallback {
    let hits = Arc::clone(hits);
    Arc::new(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

fn start_wait_count(mock: &MockApix) -> usize {
    mock.calls()
        .iter()
        .filter(|call| matches!(call, MockCall::GpioStartWait { .. }))
        .count()
}

fn stop_wait_count(mock: &MockApix) -> usize {
    mock.calls()
        .iter()
        .filter(|call| matches!(call, MockCall::GpioStopWait { .. }))
        .count()
}

#[test]
fn test_first_listener_starts_the_wait_thread_once() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    let hits = Arc::new(AtomicUsize::new(0));

    gpio.register_interrupt_callback(counting_callback(&hits)).unwrap();
    assert!(gpio.interrupt_dispatch_running());
    assert!(mock.irq_armed(18));

    // the second listener reuses the running thread
    gpio.register_interrupt_callback(counting_callback(&hits)).unwrap();
    assert_eq!(start_wait_count(&mock), 1);
    assert_eq!(gpio.interrupt_callback_count(), 2);
}

#[test]
fn test_registering_the_same_arc_twice_fails() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);

    let callback: InterruptCallback = Arc::new(|| {});
    gpio.register_interrupt_callback(Arc::clone(&callback)).unwrap();

    let err = gpio
        .register_interrupt_callback(Arc::clone(&callback))
        .unwrap_err();
    assert!(matches!(err, GpioError::CallbackAlreadyRegistered));
    assert_eq!(gpio.interrupt_callback_count(), 1);
    assert_eq!(start_wait_count(&mock), 1);
}

#[test]
fn test_events_fan_out_to_every_listener_exactly_once() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    gpio.register_interrupt_callback(counting_callback(&first)).unwrap();
    gpio.register_interrupt_callback(counting_callback(&second)).unwrap();

    assert!(mock.fire_interrupt(18));
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    assert!(mock.fire_interrupt(18));
    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[test]
fn test_removing_the_last_listener_stops_the_wait_thread() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);

    let callback: InterruptCallback = Arc::new(|| {});
    gpio.register_interrupt_callback(Arc::clone(&callback)).unwrap();
    gpio.remove_interrupt_callback(&callback).unwrap();

    assert!(!gpio.interrupt_dispatch_running());
    assert!(!mock.irq_armed(18));
    assert_eq!(stop_wait_count(&mock), 1);

    // an unarmed line has nothing to fire
    assert!(!mock.fire_interrupt(18));

    let err = gpio.remove_interrupt_callback(&callback).unwrap_err();
    assert!(matches!(err, GpioError::CallbackNotRegistered));
}

#[test]
fn test_removing_one_of_two_listeners_keeps_dispatch_running() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    let hits = Arc::new(AtomicUsize::new(0));

    let survivor = counting_callback(&hits);
    let removed: InterruptCallback = Arc::new(|| {});
    gpio.register_interrupt_callback(Arc::clone(&survivor)).unwrap();
    gpio.register_interrupt_callback(Arc::clone(&removed)).unwrap();

    gpio.remove_interrupt_callback(&removed).unwrap();
    assert!(gpio.interrupt_dispatch_running());
    assert_eq!(stop_wait_count(&mock), 0);

    assert!(mock.fire_interrupt(18));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_panics_are_contained() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    let hits = Arc::new(AtomicUsize::new(0));

    gpio.register_interrupt_callback(Arc::new(|| panic!("boom"))).unwrap();
    gpio.register_interrupt_callback(counting_callback(&hits)).unwrap();

    // the native thread must see a clean return despite the panic
    assert!(mock.fire_interrupt(18));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // dispatch survives for later events
    assert!(mock.fire_interrupt(18));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_release_stops_dispatch_before_freeing_the_line() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    gpio.register_interrupt_callback(Arc::new(|| {})).unwrap();

    gpio.release();

    let calls = mock.calls();
    let stop = calls
        .iter()
        .position(|call| matches!(call, MockCall::GpioStopWait { .. }))
        .unwrap();
    let free = calls
        .iter()
        .position(|call| matches!(call, MockCall::GpioFree { .. }))
        .unwrap();
    assert!(stop < free, "stop at {stop} must precede free at {free}");
}

#[test]
fn test_switching_away_from_irq_mode_parks_the_listeners() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    let hits = Arc::new(AtomicUsize::new(0));
    gpio.register_interrupt_callback(counting_callback(&hits)).unwrap();

    gpio.set_mode(GpioMode::Input).unwrap();
    assert!(!gpio.interrupt_dispatch_running());
    assert!(!mock.irq_armed(18));
    // the listener set is retained
    assert_eq!(gpio.interrupt_callback_count(), 1);

    // switching back does not restart dispatch by itself
    gpio.set_mode(GpioMode::IrqEdgeRising).unwrap();
    assert!(!gpio.interrupt_dispatch_running());

    gpio.restart_interrupt_dispatch().unwrap();
    assert!(gpio.interrupt_dispatch_running());
    assert!(mock.fire_interrupt(18));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_restart_without_listeners_fails() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);

    let err = gpio.restart_interrupt_dispatch().unwrap_err();
    assert!(matches!(err, GpioError::CallbackNotRegistered));
}

#[test]
fn test_restart_while_running_is_a_no_op() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 18);
    gpio.register_interrupt_callback(Arc::new(|| {})).unwrap();

    gpio.restart_interrupt_dispatch().unwrap();
    assert_eq!(start_wait_count(&mock), 1);
}

#[test]
fn test_failed_native_start_keeps_the_listener() {
    let mock = MockApix::new();
    let gpio = irq_line(&mock, 7);
    mock.fail_next_gpio(MockGpioOp::StartWait);

    let err = gpio
        .register_interrupt_callback(Arc::new(|| {}))
        .unwrap_err();
    assert!(matches!(err, GpioError::InterruptStart { .. }));
    assert_eq!(gpio.interrupt_callback_count(), 1);
    assert!(!gpio.interrupt_dispatch_running());

    // an explicit restart picks the listener up once the fault clears
    gpio.restart_interrupt_dispatch().unwrap();
    assert!(gpio.interrupt_dispatch_running());
}

#[test]
fn test_starting_dispatch_on_a_non_irq_line_fails() {
    let mock = MockApix::new();
    let gpio = Gpio::request(&mock, 3, GpioMode::Input, RequestMode::Shared)
        .unwrap();

    let err = gpio
        .register_interrupt_callback(Arc::new(|| {}))
        .unwrap_err();
    assert!(matches!(err, GpioError::InterruptStart { .. }));
}

#[test]
fn test_a_listener_may_remove_another_listener() {
    let mock = MockApix::new();
    let gpio = Arc::new(irq_line(&mock, 40));

    let removed: InterruptCallback = Arc::new(|| {});
    let gpio_in_callback = Arc::clone(&gpio);
    let target = Arc::clone(&removed);
    let remover: InterruptCallback = Arc::new(move || {
        let _ = gpio_in_callback.remove_interrupt_callback(&target);
    });

    gpio.register_interrupt_callback(remover).unwrap();
    gpio.register_interrupt_callback(Arc::clone(&removed)).unwrap();

    // must not deadlock against the dispatch snapshot
    assert!(mock.fire_interrupt(40));
    assert_eq!(gpio.interrupt_callback_count(), 1);
    assert!(gpio.interrupt_dispatch_running());
}

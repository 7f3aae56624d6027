//! Deterministic debuggee for the end-to-end tests.
//!
//! Exposes unmangled, never-inlined functions with known stack behavior so
//! tests can plant breakpoints on them by name:
//! - `scribble` writes a 64-byte stack buffer once
//! - `blast` fills a 4096-byte stack buffer, deep enough to overrun any
//!   capture window of half that size or less
//! - `recurse` counts down, so `recurse(2)` makes three invocations
//! - `idle_helper` is never called
//! - `crash_me` dereferences null (only reached with `--crash`)

#![allow(unsafe_code)] // crash_me needs a null write

use std::hint::black_box;

/// Zero the stack region the measured functions will run in, so their
/// writes are guaranteed to differ from the pristine snapshot.
#[inline(never)]
fn paint_stack() {
    let mut canvas = [0u8; 8192];
    let mut i = 0;
    while i < canvas.len() {
        canvas[i] = 0;
        i += 1;
    }
    black_box(&mut canvas);
}

#[no_mangle]
#[inline(never)]
fn scribble() -> u8 {
    let mut buf = [0u8; 64];
    let mut i = 0;
    while i < buf.len() {
        buf[i] = (i as u8) ^ 0xa5;
        i += 1;
    }
    black_box(buf[63])
}

#[no_mangle]
#[inline(never)]
fn blast() -> u8 {
    let mut buf = [0u8; 4096];
    let mut i = 0;
    while i < buf.len() {
        buf[i] = (i as u8) | 0x80;
        i += 1;
    }
    black_box(buf[4095])
}

#[no_mangle]
#[inline(never)]
fn recurse(depth: u32) -> u32 {
    if depth == 0 {
        black_box(1)
    } else {
        black_box(recurse(depth - 1) + depth)
    }
}

#[no_mangle]
#[inline(never)]
fn idle_helper() -> u32 {
    black_box(42)
}

#[no_mangle]
#[inline(never)]
fn crash_me() -> u8 {
    let ptr = std::ptr::null_mut::<u8>();
    unsafe { ptr.write_volatile(1) };
    0
}

fn main() {
    let crash = std::env::args().nth(1).as_deref() == Some("--crash");

    paint_stack();
    let a = u32::from(scribble());
    let b = recurse(2);
    let c = u32::from(blast());
    black_box(a + b + c);

    // The condition is opaque at link time, so the never-called helper
    // keeps its symbol instead of being garbage-collected
    if std::env::args().count() > 1000 {
        black_box(idle_helper());
    }

    if crash {
        black_box(crash_me());
    }
}

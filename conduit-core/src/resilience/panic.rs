//! Panic logging
//!
//! Stage runners catch panics from `process_one` and keep going, so the
//! process-wide hook only logs: it must never exit. Binaries call
//! [`install_panic_handler`] early in `main()`.

use std::any::Any;
use std::panic;
use tracing::error;

/// Route panic reports through `tracing` before the default hook runs
pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "<unknown location>".to_string());

        let thread = std::thread::current();
        error!(
            location = %location,
            thread = thread.name().unwrap_or("<unnamed>"),
            message = %payload_message(panic_info.payload()),
            "panic"
        );

        // Backtrace with RUST_BACKTRACE=1
        default_hook(panic_info);
    }));

    tracing::info!("Panic handler installed");
}

/// Best-effort text of a panic payload
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<no message>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message() {
        let caught = panic::catch_unwind(|| panic!("bad slot {}", 7)).unwrap_err();
        assert_eq!(payload_message(caught.as_ref()), "bad slot 7");

        let caught = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(payload_message(caught.as_ref()), "static");

        let caught = panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(payload_message(caught.as_ref()), "<no message>");
    }
}

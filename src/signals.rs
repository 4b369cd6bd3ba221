//! Forward termination signals to the whole process group.
//!
//! Scripts, ssh and scp run as children of the controller. When the
//! controller is told to stop, every child in its process group is told too.

const FORWARDED: [libc::c_int; 3] = [libc::SIGTERM, libc::SIGINT, libc::SIGHUP];

#[allow(unsafe_code)]
extern "C" fn forward(signal: libc::c_int) {
    // SAFETY: signal, getpgrp and killpg are async-signal-safe. Restoring the
    // default disposition first makes the signal terminate this process too.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::killpg(libc::getpgrp(), signal);
    }
}

/// Install the forwarding handlers.
#[allow(unsafe_code)]
pub fn install() {
    for signal in FORWARDED {
        // SAFETY: `forward` is an `extern "C"` function with the handler
        // signature and only calls async-signal-safe functions.
        let previous = unsafe {
            libc::signal(
                signal,
                forward as extern "C" fn(libc::c_int) as libc::sighandler_t,
            )
        };
        if previous == libc::SIG_ERR {
            log::warn!("Could not install handler for signal {signal}");
        }
    }
}

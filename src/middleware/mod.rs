//! # Middleware
//!
//! Composable handler wrappers. A middleware is a function `next → wrapped`;
//! the processor composes the registration-time list outermost-first, so for
//! `[m1, m2, m3]` the effective handler is `m1(m2(m3(h)))`.
//!
//! Middleware registered after a handler does not retroactively wrap that
//! handler: register middleware first.
//!
//! ## Built-ins
//! - [`logging`] — message type and handler latency around `next`
//! - [`recovery`] — traps handler panics and surfaces `HandlerPanic`
//! - [`encrypt_aes::encryption`] — per-message AES-GCM payload encryption
//! - [`encrypt_rsa::rsa_encryption`] — hybrid RSA-OAEP + AES-GCM encryption

pub mod encrypt_aes;
pub mod encrypt_rsa;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{error, info};

use crate::core::processor::{Handler, Middleware};
use crate::error::ProtocolError;

/// Records message type and handler latency around `next`.
pub fn logging() -> Middleware {
    Arc::new(|next: Handler| {
        Arc::new(move |ctx| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let msg_type = ctx.message_type().to_string();
                let start = Instant::now();
                let result = next(ctx).await;
                info!(%msg_type, elapsed = ?start.elapsed(), "processed message");
                result
            })
        })
    })
}

/// Traps handler panics, logs them, and surfaces a generic `HandlerPanic`
/// error to the handler chain instead of taking the task down.
pub fn recovery() -> Middleware {
    Arc::new(|next: Handler| {
        Arc::new(move |ctx| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let msg_type = ctx.message_type().to_string();
                match AssertUnwindSafe(next(ctx)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = panic_message(panic.as_ref());
                        error!(%msg_type, panic = %msg, "handler panicked");
                        Err(ProtocolError::HandlerPanic(msg))
                    }
                }
            })
        })
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

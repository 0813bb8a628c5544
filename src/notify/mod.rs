//! Toast notifications for dialer actions

mod toast;

pub use toast::{Notifier, Toast, ToastLevel, ToastPhase, ToastTimings};

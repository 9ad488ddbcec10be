//! Notifier port: out-of-band messages to hospital staff.

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Administrator,
    Doctor,
    Pharmacist,
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Administrator => write!(f, "Administrator"),
            Self::Doctor => write!(f, "Doctor"),
            Self::Pharmacist => write!(f, "Pharmacist"),
        }
    }
}

/// Fire-and-forget notification sink.
///
/// Implementations must not block the caller on delivery and must not
/// surface delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Recipient, message: &str);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, recipient: Recipient, message: &str) {
        (**self).notify(recipient, message);
    }
}

//! Payment sink that keeps every notice.

use std::sync::{Mutex, PoisonError};

use lemonade_transport::{PaymentNotice, PaymentSink};

/// Records all payment notices in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<PaymentNotice>>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices recorded so far.
    pub fn notices(&self) -> Vec<PaymentNotice> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PaymentSink for RecordingSink {
    fn record_payment_required(&self, notice: PaymentNotice) {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).push(notice);
    }
}

//! Notifier double for alert tests

use async_trait::async_trait;
use std::sync::Mutex;

use crate::alerts::{
    notifier::{Notifier, NotifierError},
    types::Alert,
};

/// Records every alert it is asked to send
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: Mutex<Vec<Alert>>,
    /// Reject every delivery after recording it
    pub(crate) fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifierError> {
        self.sent.lock().unwrap().push(alert.clone());
        if self.fail {
            return Err(NotifierError::Status(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(())
    }
}

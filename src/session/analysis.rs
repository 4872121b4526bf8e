use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use crate::client::{InferenceClient, Upload};
use crate::emotion::EmotionResult;
use crate::error::{Result, SerError};

/// Anything that can turn an uploaded clip into emotion scores
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, upload: Upload) -> Result<EmotionResult>;
}

#[async_trait::async_trait]
impl Predictor for InferenceClient {
    async fn predict(&self, upload: Upload) -> Result<EmotionResult> {
        InferenceClient::predict(self, upload).await
    }
}

/// What the user is looking at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ViewState {
    /// Ready for a recording or upload, with the last failure if any
    Home { error: Option<String> },
    /// An upload is in flight
    Loading,
    Results(EmotionResult),
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState::Home { error: None }
    }
}

/// Drives the Home → Loading → Results flow for one user
///
/// Only one upload may be in flight; a second `submit` is rejected with
/// `Busy` until the first one settles.
pub struct AnalysisSession<P: Predictor> {
    predictor: P,
    view: Mutex<ViewState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even if the submitting future is dropped
struct InFlight<'a> {
    flag: &'a AtomicBool,
    view: &'a Mutex<ViewState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut view = lock(self.view);
        if *view == ViewState::Loading {
            *view = ViewState::default();
        }
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn lock(view: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<P: Predictor> AnalysisSession<P> {
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            view: Mutex::new(ViewState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn view(&self) -> ViewState {
        lock(&self.view).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Upload a clip; failures land back on Home with a short message
    pub async fn submit(&self, upload: Upload) -> Result<EmotionResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Rejecting upload while another is in flight");
            return Err(SerError::Busy);
        }
        let _guard = InFlight {
            flag: &self.in_flight,
            view: &self.view,
        };

        *lock(&self.view) = ViewState::Loading;

        let outcome = self.predictor.predict(upload).await;

        let mut view = lock(&self.view);
        match &outcome {
            Ok(result) => {
                *view = ViewState::Results(*result);
            }
            Err(e) => {
                info!("Analysis failed: {}", e);
                *view = ViewState::Home {
                    error: Some(e.user_message()),
                };
            }
        }
        drop(view);

        outcome
    }

    /// Leave the results view and clear any error
    pub fn back(&self) -> Result<()> {
        if self.is_busy() {
            return Err(SerError::Busy);
        }
        *lock(&self.view) = ViewState::default();
        Ok(())
    }
}

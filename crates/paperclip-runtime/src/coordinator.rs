//! Latest-wins discipline for primary generations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use paperclip_core::{Completion, FinishReason, GenerationError, GenerationRequest, RequestId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::session::InferenceSession;

#[derive(Debug)]
struct InFlight {
    id: RequestId,
    cancel: CancellationToken,
}

type Marker = Arc<Mutex<Option<InFlight>>>;

fn lock(marker: &Marker) -> MutexGuard<'_, Option<InFlight>> {
    marker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle for one submitted request.
///
/// Dropping the ticket clears the in-flight marker, but only while the
/// marker still refers to this request.
#[derive(Debug)]
pub struct RequestTicket {
    id: RequestId,
    cancel: CancellationToken,
    marker: Marker,
}

impl RequestTicket {
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Token cancelled when this request is superseded, aborted or times out.
    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `request` on `session` under this ticket.
    ///
    /// The wall-clock timeout fires the ticket's token; a request stopped
    /// that way finishes as [`FinishReason::TimedOut`] with its partial text.
    pub async fn run(
        &self,
        session: &InferenceSession,
        request: &GenerationRequest,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Completion, GenerationError> {
        let deadline = Deadline::arm(self.cancel.clone(), request.timeout);
        let mut completion = session
            .generate(&request.prompt, &request.options, &self.cancel, sink)
            .await?;

        if completion.finish == FinishReason::Cancelled && deadline.fired() {
            info!(request_id = self.id, timeout = ?request.timeout, "Generation timed out");
            completion.finish = FinishReason::TimedOut;
        }
        Ok(completion)
    }
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        let mut current = lock(&self.marker);
        if current.as_ref().is_some_and(|f| f.id == self.id) {
            *current = None;
        }
    }
}

/// Serializes submissions against the primary context.
///
/// Submitting a new request cancels the one in flight. The new request only
/// starts producing once the cancelled one has released the context, so
/// tokens of two requests never interleave.
#[derive(Debug, Default)]
pub struct GenerationCoordinator {
    in_flight: Marker,
    next_id: AtomicU64,
}

impl GenerationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request, cancelling whichever one is in flight.
    pub fn begin(&self) -> RequestTicket {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let previous = lock(&self.in_flight).replace(InFlight {
            id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            debug!(superseded = previous.id, request_id = id, "Cancelling in-flight request");
            previous.cancel.cancel();
        }

        RequestTicket {
            id,
            cancel,
            marker: Arc::clone(&self.in_flight),
        }
    }

    /// Cancel the previous request, then generate `request` on `session`.
    pub async fn submit(
        &self,
        session: &InferenceSession,
        request: &GenerationRequest,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Completion, GenerationError> {
        self.begin().run(session, request, sink).await
    }

    /// Abort the in-flight request, if any. Returns its id.
    pub fn cancel_current(&self) -> Option<RequestId> {
        let current = lock(&self.in_flight);
        current.as_ref().map(|f| {
            f.cancel.cancel();
            f.id
        })
    }

    /// Id of the request currently in flight.
    pub fn in_flight(&self) -> Option<RequestId> {
        lock(&self.in_flight).as_ref().map(|f| f.id)
    }
}

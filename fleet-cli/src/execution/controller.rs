//! Execution stream controller
//!
//! Sends one submission over a [`MessageStream`], then receives job results
//! in a background task until the server ends the stream, an error arrives,
//! the deadline passes or the operator interrupts.
//!
//! The receiver pushes parsed events onto a bounded queue; the foreground
//! loop renders and accumulates them in arrival order. Cancellation is
//! checked first on every iteration, so an interrupt wins over events that
//! are queued but not yet taken. The transport is always closed before
//! [`run_stream`] returns.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::render::JobRenderer;
use crate::error::ExecError;
use fleet_client::MessageStream;
use fleet_core::domain::job::JobResult;
use fleet_core::dto::error::ApiErrors;
use fleet_core::dto::execution::ExecutionRequest;

/// Capacity of the queue between the receiver task and the foreground loop
const EVENT_QUEUE_CAPACITY: usize = 64;

/// How a stream ended
#[derive(Debug)]
pub enum StreamEnd {
    /// The server closed the stream after sending every result
    Completed,
    /// Transport error, server error envelope or unrecognized message
    Failed(ExecError),
    /// Interrupted by the operator
    Cancelled,
}

/// Jobs received before the stream ended, and how it ended
#[derive(Debug)]
pub struct StreamOutcome {
    pub jobs: Vec<JobResult>,
    pub end: StreamEnd,
}

impl StreamOutcome {
    /// Split into the received jobs and the invocation's result
    ///
    /// Cancellation is not an error.
    pub fn into_parts(self) -> (Vec<JobResult>, Result<(), ExecError>) {
        let result = match self.end {
            StreamEnd::Completed | StreamEnd::Cancelled => Ok(()),
            StreamEnd::Failed(err) => Err(err),
        };
        (self.jobs, result)
    }
}

enum StreamEvent {
    Job(JobResult),
    Failed(ExecError),
}

/// Classify one inbound message as a job or a server error
pub fn classify_message(raw: &str) -> Result<JobResult, ExecError> {
    if let Ok(job) = serde_json::from_str::<JobResult>(raw) {
        if !job.jid.is_empty() {
            return Ok(job);
        }
    }

    if let Some(envelope) = ApiErrors::parse(raw) {
        return Err(ExecError::Server(envelope));
    }

    Err(ExecError::UnrecognizedMessage(raw.to_string()))
}

/// Resolves once `deadline` has passed, never when there is none
pub(crate) async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) if Instant::now() >= at => {}
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Submit `request` and drive the stream to its end
///
/// Nothing is sent when `cancel` already fired or the deadline already
/// passed.
///
/// # Arguments
/// * `transport` - Freshly opened stream, owned for the rest of the call
/// * `request` - Submission sent once before receiving
/// * `renderer` - Gets each job in arrival order
/// * `cancel` - Operator interrupt
/// * `deadline` - Point in time after which the stream is abandoned
pub async fn run_stream(
    mut transport: Box<dyn MessageStream>,
    request: &ExecutionRequest,
    renderer: &mut dyn JobRenderer,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> StreamOutcome {
    let not_sent = if cancel.is_cancelled() {
        info!("Execution interrupted before submission");
        Some(StreamEnd::Cancelled)
    } else if deadline.is_some_and(|at| Instant::now() >= at) {
        warn!("Execution deadline reached before submission");
        Some(StreamEnd::Failed(ExecError::DeadlineExceeded))
    } else {
        None
    };
    if let Some(end) = not_sent {
        close_transport(transport.as_mut()).await;
        return StreamOutcome { jobs: Vec::new(), end };
    }

    if let Err(err) = submit(transport.as_mut(), request).await {
        close_transport(transport.as_mut()).await;
        return StreamOutcome {
            jobs: Vec::new(),
            end: StreamEnd::Failed(err),
        };
    }

    let (events_tx, mut events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let stop = CancellationToken::new();
    let receiver = tokio::spawn(receive_loop(transport, events_tx, stop.clone()));

    let expired = deadline_reached(deadline);
    tokio::pin!(expired);

    let mut jobs = Vec::new();
    let end = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Execution interrupted, {} job(s) received", jobs.len());
                break StreamEnd::Cancelled;
            }
            _ = &mut expired => {
                warn!("Execution deadline reached, {} job(s) received", jobs.len());
                break StreamEnd::Failed(ExecError::DeadlineExceeded);
            }
            event = events_rx.recv() => match event {
                Some(StreamEvent::Job(job)) => {
                    debug!(jid = %job.jid, client = %job.client_id, status = %job.status, "job received");
                    if let Err(e) = renderer.render(&job) {
                        jobs.push(job);
                        break StreamEnd::Failed(ExecError::Render(e));
                    }
                    jobs.push(job);
                }
                Some(StreamEvent::Failed(err)) => break StreamEnd::Failed(err),
                None => {
                    info!("Execution stream ended, {} job(s) received", jobs.len());
                    break StreamEnd::Completed;
                }
            },
        }
    };

    // Unblock a receiver waiting on a full queue, then wait for it to close
    // the transport.
    drop(events_rx);
    stop.cancel();
    if let Err(e) = receiver.await {
        warn!("Stream receiver task failed: {}", e);
    }

    StreamOutcome { jobs, end }
}

async fn submit(transport: &mut dyn MessageStream, request: &ExecutionRequest) -> Result<(), ExecError> {
    let payload = serde_json::to_string(request)
        .map_err(|_| ExecError::InvalidRequest("request cannot be encoded as JSON"))?;
    transport.send(payload).await?;
    info!(
        clients = request.client_ids.len(),
        groups = request.group_ids.len(),
        "Execution request submitted"
    );
    Ok(())
}

async fn receive_loop(
    mut transport: Box<dyn MessageStream>,
    events: mpsc::Sender<StreamEvent>,
    stop: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = stop.cancelled() => break,
            received = transport.receive() => received,
        };

        let event = match received {
            Ok(Some(raw)) => match classify_message(&raw) {
                Ok(job) => StreamEvent::Job(job),
                Err(err) => StreamEvent::Failed(err),
            },
            Ok(None) => break,
            Err(err) => StreamEvent::Failed(err.into()),
        };

        let fatal = matches!(event, StreamEvent::Failed(_));
        if events.send(event).await.is_err() || fatal {
            break;
        }
    }

    close_transport(transport.as_mut()).await;
}

async fn close_transport(transport: &mut dyn MessageStream) {
    if let Err(e) = transport.close().await {
        warn!("Failed to close execution stream: {}", e);
    }
}

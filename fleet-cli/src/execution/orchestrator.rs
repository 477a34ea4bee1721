//! Sequencing of one invocation
//!
//! Resolve targets (or load them from a prior log), build the request, run
//! the stream, then persist whatever jobs arrived.

use std::path::PathBuf;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::controller::{StreamEnd, deadline_reached, run_stream};
use super::log::{Requester, confirm_overwrite, load_failed_client_ids, write_log};
use super::render::JobRenderer;
use super::request::{RequestOptions, build_request};
use crate::cache::EndpointCache;
use crate::error::{ExecError, Result};
use crate::host::HostInfoProvider;
use crate::id_resolver::EndpointResolver;
use crate::prompt::Prompt;
use crate::types::{ResolvedTargets, TargetSelector};
use fleet_client::{EndpointSource, MessageStream, StreamConnector};
use fleet_core::domain::execution_log::count_failed_clients;
use fleet_core::domain::job::JobResult;
use fleet_core::dto::execution::ExecutionRequest;

/// Where the endpoints of a submission come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targeting {
    Select(TargetSelector),
    /// Endpoints that failed in a previous execution log
    Replay(PathBuf),
}

/// Everything one invocation needs from the command line
#[derive(Debug, Clone)]
pub struct Invocation {
    pub targeting: Targeting,
    pub options: RequestOptions,
    /// Execution log to write at the end
    pub log_path: Option<PathBuf>,
    /// Ask before overwriting a log or replaying failed endpoints
    pub interactive: bool,
}

/// Totals of a finished invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub jobs: usize,
    /// Distinct endpoints with a failed job
    pub failed: usize,
    pub cancelled: bool,
}

/// Collaborators of an invocation
pub struct Executor<'a> {
    pub source: &'a dyn EndpointSource,
    pub cache: Option<&'a EndpointCache>,
    pub connector: &'a dyn StreamConnector,
    pub prompt: &'a dyn Prompt,
    pub host: &'a dyn HostInfoProvider,
    pub requester: Requester,
}

impl Executor<'_> {
    /// Run one invocation end to end
    ///
    /// An interrupt or the deadline before submission stops the invocation
    /// with nothing sent. Jobs received before a failure or an interrupt are
    /// still written to the execution log. When both the stream and the log
    /// write fail, both are reported.
    pub async fn run(
        &self,
        invocation: &Invocation,
        renderer: &mut dyn JobRenderer,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<ExecutionSummary> {
        let host = self.host.host_info();

        let prepared = tokio::select! {
            biased;

            _ = cancel.cancelled() => None,
            _ = deadline_reached(deadline) => Some(Err(ExecError::DeadlineExceeded)),
            prepared = self.prepare(invocation) => Some(prepared),
        };
        let Some(prepared) = prepared else {
            info!("Execution interrupted before submission");
            return Ok(summarize(&[], true));
        };
        let (request, transport) = prepared?;

        let outcome = run_stream(transport, &request, renderer, cancel, deadline).await;
        let cancelled = matches!(outcome.end, StreamEnd::Cancelled);
        let (jobs, streamed) = outcome.into_parts();

        if let Some(path) = &invocation.log_path {
            match (streamed, write_log(path, &jobs, &host, &self.requester)) {
                (Err(stream), Err(log)) => {
                    return Err(ExecError::LogAfterFailure {
                        stream: Box::new(stream),
                        log: Box::new(log),
                    });
                }
                (streamed, written) => {
                    streamed?;
                    written?;
                }
            }
        } else {
            streamed?;
        }

        Ok(summarize(&jobs, cancelled))
    }

    /// Everything up to an open stream: confirmation, targets, request
    async fn prepare(&self, invocation: &Invocation) -> Result<(ExecutionRequest, Box<dyn MessageStream>)> {
        if let Some(path) = &invocation.log_path {
            confirm_overwrite(path, invocation.interactive, self.prompt).await?;
        }

        let targets = self.targets(invocation).await?;
        let request = build_request(&targets, &invocation.options)?;
        let transport = self.connector.connect(request.kind()).await?;
        Ok((request, transport))
    }

    async fn targets(&self, invocation: &Invocation) -> Result<ResolvedTargets> {
        match &invocation.targeting {
            Targeting::Select(selector) => {
                EndpointResolver::new(self.source, self.cache)
                    .resolve(selector)
                    .await
            }
            Targeting::Replay(path) => {
                let client_ids = load_failed_client_ids(path, invocation.interactive, self.prompt).await?;
                info!("Retrying {} failed client(s) from {}", client_ids.len(), path.display());
                Ok(ResolvedTargets {
                    client_ids,
                    group_ids: Vec::new(),
                })
            }
        }
    }
}

fn summarize(jobs: &[JobResult], cancelled: bool) -> ExecutionSummary {
    ExecutionSummary {
        jobs: jobs.len(),
        failed: count_failed_clients(jobs),
        cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::controller::tests::{Recorded, ScriptedStream, Step, job_message};
    use crate::execution::log::read_log;
    use crate::execution::log::tests::{ScriptedPrompt, host, requester, three_jobs};
    use crate::host::HostInfo;
    use crate::id_resolver::tests::{FakeSource, catalog};
    use async_trait::async_trait;
    use fleet_core::dto::execution::SubmissionKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FakeConnector {
        stream: Mutex<Option<ScriptedStream>>,
        connects: AtomicUsize,
        kinds: Mutex<Vec<SubmissionKind>>,
        /// Never finish connecting
        hang: AtomicBool,
    }

    impl FakeConnector {
        fn new(steps: Vec<Step>) -> (Self, Arc<Mutex<Recorded>>) {
            let (stream, recorded) = ScriptedStream::new(steps);
            (
                Self {
                    stream: Mutex::new(Some(stream)),
                    connects: AtomicUsize::new(0),
                    kinds: Mutex::new(Vec::new()),
                    hang: AtomicBool::new(false),
                },
                recorded,
            )
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamConnector for FakeConnector {
        async fn connect(&self, kind: SubmissionKind) -> fleet_client::Result<Box<dyn MessageStream>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.kinds.lock().unwrap().push(kind);
            if self.hang.load(Ordering::SeqCst) {
                return std::future::pending().await;
            }
            let stream = self.stream.lock().unwrap().take();
            match stream {
                Some(stream) => Ok(Box::new(stream)),
                None => Err(fleet_client::ClientError::Transport(
                    "already connected".to_string(),
                )),
            }
        }
    }

    struct FixedHost;

    impl HostInfoProvider for FixedHost {
        fn host_info(&self) -> HostInfo {
            host()
        }
    }

    #[derive(Default)]
    struct Collect {
        jobs: Vec<JobResult>,
    }

    impl JobRenderer for Collect {
        fn render(&mut self, job: &JobResult) -> std::io::Result<()> {
            self.jobs.push(job.clone());
            Ok(())
        }
    }

    fn executor<'a>(
        source: &'a FakeSource,
        connector: &'a FakeConnector,
        prompt: &'a ScriptedPrompt,
    ) -> Executor<'a> {
        Executor {
            source,
            cache: None,
            connector,
            prompt,
            host: &FixedHost,
            requester: requester(),
        }
    }

    fn invocation(targeting: Targeting, log_path: Option<PathBuf>) -> Invocation {
        Invocation {
            targeting,
            options: RequestOptions {
                command: "cmd".to_string(),
                timeout_sec: 1,
                execute_concurrently: true,
                ..Default::default()
            },
            log_path,
            interactive: true,
        }
    }

    fn ids(values: &[&str]) -> Targeting {
        Targeting::Select(TargetSelector::ClientIds(
            values.iter().map(|v| v.to_string()).collect(),
        ))
    }

    fn sent_requests(recorded: &Arc<Mutex<Recorded>>) -> Vec<ExecutionRequest> {
        recorded
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_single_job_rendered_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.yaml");
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) =
            FakeConnector::new(vec![Step::Message(job_message("j1", "1235", "done"))]);
        let mut renderer = Collect::default();

        let summary = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1235"]), Some(log_path.clone())),
                &mut renderer,
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            summary,
            ExecutionSummary {
                jobs: 1,
                failed: 0,
                cancelled: false
            }
        );

        let sent = sent_requests(&recorded);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].client_ids, vec!["1235"]);
        assert_eq!(sent[0].command.as_deref(), Some("cmd"));
        assert_eq!(sent[0].timeout_sec, 1);
        assert!(sent[0].execute_concurrently);
        assert_eq!(connector.kinds.lock().unwrap().as_slice(), &[SubmissionKind::Command]);

        assert_eq!(renderer.jobs.len(), 1);
        let record = read_log(&log_path).unwrap();
        assert_eq!(record.jobs, renderer.jobs);
        assert_eq!(record.num_clients, 1);
        assert_eq!(record.executed_by, "operator");
        assert_eq!(recorded.lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn test_unknown_name_sends_nothing() {
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) = FakeConnector::new(vec![]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(Targeting::Select(TargetSelector::Names(vec!["X".to_string()])), None),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown client(s) 'X'");
        assert_eq!(connector.connects(), 0);
        assert!(recorded.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_replay_targets_failed_client() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("previous.yaml");
        write_log(&previous, &three_jobs(), &host(), &requester()).unwrap();

        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) =
            FakeConnector::new(vec![Step::Message(job_message("j9", "2", "done"))]);

        executor(&source, &connector, &prompt)
            .run(
                &invocation(Targeting::Replay(previous), None),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        let sent = sent_requests(&recorded);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].client_ids, vec!["2"]);
        assert!(sent[0].group_ids.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_replay_declined_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("previous.yaml");
        write_log(&previous, &three_jobs(), &host(), &requester()).unwrap();

        let source = catalog();
        let prompt = ScriptedPrompt::answering(false);
        let (connector, _) = FakeConnector::new(vec![]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(Targeting::Replay(previous), None),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::ClientIdsNotConfirmed));
        assert_eq!(err.to_string(), "client IDs not confirmed");
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_declined_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.yaml");
        std::fs::write(&log_path, "previous run").unwrap();

        let source = catalog();
        let prompt = ScriptedPrompt::answering(false);
        let (connector, _) = FakeConnector::new(vec![]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1235"]), Some(log_path.clone())),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "overwrite not confirmed");
        assert_eq!(connector.connects(), 0);
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "previous run");
    }

    #[tokio::test]
    async fn test_partial_jobs_logged_on_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.yaml");
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, _) = FakeConnector::new(vec![
            Step::Message(job_message("j1", "1", "failed")),
            Step::Message(r#"{"errors":[{"code":"503","title":"unavailable","detail":"agent gone"}]}"#.to_string()),
        ]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1", "2"]), Some(log_path.clone())),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::Server(_)));
        let record = read_log(&log_path).unwrap();
        assert_eq!(record.jobs.len(), 1);
        assert_eq!(record.failed, 1);
    }

    #[tokio::test]
    async fn test_interrupt_is_not_an_error() {
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) = FakeConnector::new(vec![Step::Hang]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1"]), None),
                &mut Collect::default(),
                &cancel,
                None,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.jobs, 0);
        assert_eq!(connector.connects(), 0);
        assert!(recorded.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_while_connecting_sends_nothing() {
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) = FakeConnector::new(vec![]);
        connector.hang.store(true, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let executor = executor(&source, &connector, &prompt);
        let invocation = invocation(ids(&["1"]), None);
        let mut renderer = Collect::default();
        let execution = executor.run(&invocation, &mut renderer, &cancel, None);
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        };
        let (summary, _) = tokio::join!(execution, interrupt);

        assert!(summary.unwrap().cancelled);
        assert_eq!(connector.connects(), 1);
        assert!(recorded.lock().unwrap().sent.is_empty());
    }

    /// An operator who never answers
    struct SilentPrompt;

    #[async_trait]
    impl Prompt for SilentPrompt {
        fn notify(&self, _text: &str) {}

        async fn confirm(&self, _question: &str) -> crate::error::Result<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_interrupt_while_prompting_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("run.yaml");
        std::fs::write(&log_path, "previous run").unwrap();

        let source = catalog();
        let (connector, recorded) = FakeConnector::new(vec![]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let executor = Executor {
            source: &source,
            cache: None,
            connector: &connector,
            prompt: &SilentPrompt,
            host: &FixedHost,
            requester: requester(),
        };
        let invocation = invocation(ids(&["1"]), Some(log_path.clone()));
        let mut renderer = Collect::default();
        let execution = executor.run(&invocation, &mut renderer, &cancel, None);
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        };
        let (summary, _) = tokio::join!(execution, interrupt);

        assert!(summary.unwrap().cancelled);
        assert_eq!(connector.connects(), 0);
        assert!(recorded.lock().unwrap().sent.is_empty());
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "previous run");
    }

    #[tokio::test]
    async fn test_past_deadline_fails_before_connecting() {
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, recorded) = FakeConnector::new(vec![]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1"]), None),
                &mut Collect::default(),
                &CancellationToken::new(),
                Some(Instant::now()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::DeadlineExceeded));
        assert_eq!(connector.connects(), 0);
        assert!(recorded.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_reported_with_stream_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("missing").join("run.yaml");
        let source = catalog();
        let prompt = ScriptedPrompt::answering(true);
        let (connector, _) = FakeConnector::new(vec![
            Step::Message(job_message("j1", "1", "failed")),
            Step::Message(r#"{"errors":[{"code":"503","title":"unavailable","detail":"agent gone"}]}"#.to_string()),
        ]);

        let err = executor(&source, &connector, &prompt)
            .run(
                &invocation(ids(&["1", "2"]), Some(log_path.clone())),
                &mut Collect::default(),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();

        let ExecError::LogAfterFailure { stream, log } = &err else {
            panic!("unexpected error: {}", err);
        };
        assert!(matches!(**stream, ExecError::Server(_)));
        assert!(matches!(**log, ExecError::LogWrite { .. }));
        let message = err.to_string();
        assert!(message.contains("unavailable"));
        assert!(message.contains("execution log also failed"));
        assert!(!log_path.exists());
    }
}

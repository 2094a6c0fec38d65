use std::collections::VecDeque;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use triage_ai::{AssistantStreamEvent, AssistantsClient, Run, RunEventStream};

use crate::tool_dispatch::ToolDispatcher;

#[derive(Debug, Clone, Default, PartialEq)]
/// Summary of one streamed run, including every resumed stream.
pub struct RunReport {
    pub streams: usize,
    pub messages: Vec<String>,
    pub tool_rounds: usize,
    pub tool_calls: usize,
    pub completed_runs: usize,
    pub failed_runs: Vec<String>,
}

fn describe_run_failure(run: &Run) -> String {
    let status = run.status.as_deref().unwrap_or("failed");
    match &run.last_error {
        Some(error) => format!(
            "run {} {status}: {} ({})",
            run.id,
            error.message.as_deref().unwrap_or("no message"),
            error.code.as_deref().unwrap_or("no code")
        ),
        None => format!("run {} {status}", run.id),
    }
}

/// Starts a streamed run on the thread and drains it, resuming after every tool round.
///
/// Streams are consumed strictly in FIFO order; a resumed stream is only read once the
/// stream that requested the tool outputs has finished.
pub async fn drive_run(
    assistants: &dyn AssistantsClient,
    dispatcher: &mut ToolDispatcher,
    thread_id: &str,
    assistant_id: &str,
) -> Result<RunReport> {
    let initial = assistants
        .create_run_stream(thread_id, assistant_id)
        .await
        .with_context(|| format!("failed to start run on thread {thread_id}"))?;
    let mut queue: VecDeque<RunEventStream> = VecDeque::from([initial]);
    let mut report = RunReport::default();

    while let Some(mut stream) = queue.pop_front() {
        report.streams += 1;
        while let Some(event) = stream.next().await {
            let event = event.context("run event stream failed")?;
            match event {
                AssistantStreamEvent::MessageCompleted(message) => {
                    for part in message.text_parts() {
                        println!("{part}");
                        report.messages.push(part.to_string());
                    }
                }
                AssistantStreamEvent::RunRequiresAction(run) => {
                    let calls = run.tool_calls();
                    let outputs = dispatcher.handle_tool_calls(calls).await?;
                    if outputs.len() != calls.len() {
                        bail!(
                            "produced {} tool outputs for {} tool calls in run {}",
                            outputs.len(),
                            calls.len(),
                            run.id
                        );
                    }
                    report.tool_rounds += 1;
                    report.tool_calls += calls.len();
                    let resumed = assistants
                        .submit_tool_outputs_stream(thread_id, &run.id, outputs)
                        .await
                        .with_context(|| format!("failed to submit tool outputs for run {}", run.id))?;
                    queue.push_back(resumed);
                }
                AssistantStreamEvent::RunStepCompleted(step) => {
                    for result in step.file_search_results() {
                        tracing::info!(
                            step_id = %step.id,
                            file_name = %result.file_name,
                            score = result.score,
                            "file search result"
                        );
                    }
                }
                AssistantStreamEvent::RunCompleted(run) => {
                    report.completed_runs += 1;
                    tracing::debug!(run_id = %run.id, "run completed");
                }
                AssistantStreamEvent::RunFailed(run) => {
                    let failure = describe_run_failure(&run);
                    tracing::warn!(run_id = %run.id, "{failure}");
                    report.failed_runs.push(failure);
                }
                AssistantStreamEvent::Error(message) => {
                    bail!("assistants stream reported an error: {message}");
                }
                AssistantStreamEvent::Done => break,
                AssistantStreamEvent::Other(name) => {
                    tracing::debug!(event = %name, "ignoring stream event");
                }
            }
        }
    }

    tracing::info!(
        streams = report.streams,
        tool_rounds = report.tool_rounds,
        tool_calls = report.tool_calls,
        messages = report.messages.len(),
        completed_runs = report.completed_runs,
        failed_runs = report.failed_runs.len(),
        "run finished"
    );
    Ok(report)
}

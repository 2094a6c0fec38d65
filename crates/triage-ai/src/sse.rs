//! Server-sent event decoding for streamed assistant runs.
//!
//! Run streams interleave `event:` and `data:` lines separated by blank
//! lines. Frames are split on raw bytes so multi-byte characters cut across
//! network chunks survive, and are only decoded once complete.

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};

use crate::types::{api_error_message, AssistantStreamEvent, AssistantsError, RunEventStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub(crate) event: Option<String>,
    pub(crate) data: String,
}

/// Removes every complete frame from `buffer`, leaving a trailing partial frame in place.
pub(crate) fn drain_frames(buffer: &mut Vec<u8>) -> Vec<SseFrame> {
    buffer.retain(|byte| *byte != b'\r');
    let mut frames = Vec::new();
    while let Some(pos) = buffer.windows(2).position(|window| window == b"\n\n") {
        let block: Vec<u8> = buffer.drain(..pos + 2).collect();
        let block = String::from_utf8_lossy(&block[..pos]);
        if let Some(frame) = parse_frame(&block) {
            frames.push(frame);
        }
    }
    frames
}

fn parse_frame(block: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

pub(crate) fn decode_stream_event(
    frame: &SseFrame,
) -> Result<AssistantStreamEvent, AssistantsError> {
    let data = frame.data.as_str();
    let Some(event) = frame.event.as_deref() else {
        if data.trim() == "[DONE]" {
            return Ok(AssistantStreamEvent::Done);
        }
        return Ok(AssistantStreamEvent::Other("message".to_string()));
    };

    let decoded = match event {
        "thread.message.completed" => {
            AssistantStreamEvent::MessageCompleted(serde_json::from_str(data)?)
        }
        "thread.run.requires_action" => {
            AssistantStreamEvent::RunRequiresAction(serde_json::from_str(data)?)
        }
        "thread.run.step.completed" => {
            AssistantStreamEvent::RunStepCompleted(serde_json::from_str(data)?)
        }
        "thread.run.completed" => AssistantStreamEvent::RunCompleted(serde_json::from_str(data)?),
        "thread.run.failed"
        | "thread.run.expired"
        | "thread.run.cancelled"
        | "thread.run.incomplete" => AssistantStreamEvent::RunFailed(serde_json::from_str(data)?),
        "error" => {
            AssistantStreamEvent::Error(api_error_message(data).unwrap_or_else(|| data.to_string()))
        }
        "done" => AssistantStreamEvent::Done,
        other => AssistantStreamEvent::Other(other.to_string()),
    };
    Ok(decoded)
}

struct SseStreamState {
    chunks: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: Vec<u8>,
    pending: VecDeque<SseFrame>,
    finished: bool,
}

/// Turns a streaming run response into decoded events, ending after `done`.
pub(crate) fn run_event_stream(response: reqwest::Response) -> RunEventStream {
    let state = SseStreamState {
        chunks: response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                let event = decode_stream_event(&frame);
                if matches!(event, Ok(AssistantStreamEvent::Done) | Err(_)) {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    let frames = drain_frames(&mut state.buffer);
                    state.pending.extend(frames);
                }
                Some(Err(error)) => {
                    state.finished = true;
                    return Some((Err(AssistantsError::Http(error)), state));
                }
                None => {
                    state.finished = true;
                    if !state.buffer.iter().all(u8::is_ascii_whitespace) {
                        state.buffer.extend_from_slice(b"\n\n");
                        let frames = drain_frames(&mut state.buffer);
                        state.pending.extend(frames);
                    }
                }
            }
        }
    })
    .boxed()
}

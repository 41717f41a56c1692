use std::error::Error;
use std::io::{self, Write};

use thiserror::Error;

use fixprint_types::{DecodedMessage, Decoder};

use crate::input::{InputSource, RawLine};
use crate::interrupt::InterruptFlag;
use crate::summary::MessageSummary;

/// Lifecycle of a stream loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Interrupted,
    Stopped,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("line {line}: could not decode message")]
    Decode {
        line: u64,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    #[error("failed to read input after line {line}")]
    Read {
        line: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output")]
    Write(#[source] io::Error),
}

/// Why the loop stopped
#[derive(Debug)]
pub enum StopReason {
    EndOfStream,
    Interrupted,
    Failed(StreamError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a finished run: totals plus the reason it ended
#[derive(Debug)]
pub struct RunOutcome {
    pub decoded: u64,
    pub summary: Option<MessageSummary>,
    pub reason: StopReason,
}

/// Reads lines, decodes them, prints each message and keeps the counts
pub struct StreamLoop<D> {
    decoder: D,
    interrupt: InterruptFlag,
    offset: usize,
    state: LoopState,
    decoded: u64,
    summary: Option<MessageSummary>,
}

impl<D: Decoder> StreamLoop<D> {
    pub fn new(decoder: D, interrupt: InterruptFlag) -> Self {
        Self {
            decoder,
            interrupt,
            offset: 0,
            state: LoopState::Running,
            decoded: 0,
            summary: None,
        }
    }

    /// Bytes skipped at the start of every line before decoding
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Keep a per message type summary
    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.summary = enabled.then(MessageSummary::new);
        self
    }

    /// `Running` until `run` returns, then `Interrupted` or `Stopped`
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until end of stream, interruption or the first failure
    ///
    /// The interrupt flag is checked before every read and also wakes a read
    /// that is waiting on a slow stream. A decode failure stops the loop
    /// without reading further lines; everything rendered before it stays
    /// valid and is counted in the outcome. A loop runs once; the summary
    /// moves into the outcome.
    pub async fn run<W: Write>(&mut self, input: &mut InputSource<'_>, out: &mut W) -> RunOutcome {
        tracing::debug!(
            offset = self.offset,
            summary = self.summary.is_some(),
            owned_input = input.is_owned(),
            "stream loop started"
        );

        let mut reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.interrupt.requested() => None,
                line = input.next_line() => Some(line),
            };

            let Some(read) = next else {
                self.transition(LoopState::Interrupted);
                break StopReason::Interrupted;
            };

            let line = match read {
                Ok(Some(line)) => line,
                Ok(None) => break StopReason::EndOfStream,
                Err(source) => {
                    break StopReason::Failed(StreamError::Read {
                        line: input.lines_read(),
                        source,
                    });
                }
            };

            if let Err(err) = self.process(&line, out) {
                break StopReason::Failed(err);
            }
        };

        if let Err(err) = out.flush() {
            if !reason.is_failure() {
                reason = StopReason::Failed(StreamError::Write(err));
            }
        }

        if self.state == LoopState::Running {
            self.transition(LoopState::Stopped);
        }
        tracing::debug!(
            decoded = self.decoded,
            lines = input.lines_read(),
            reason = ?reason,
            "stream loop finished"
        );

        RunOutcome {
            decoded: self.decoded,
            summary: self.summary.take(),
            reason,
        }
    }

    fn process<W: Write>(&mut self, line: &RawLine, out: &mut W) -> Result<(), StreamError> {
        let payload = line.payload(self.offset);
        if payload.is_empty() {
            tracing::trace!(line = line.number(), "skipping empty line");
            return Ok(());
        }

        let message = self
            .decoder
            .decode(payload)
            .map_err(|err| StreamError::Decode {
                line: line.number(),
                source: Box::new(err),
            })?;

        writeln!(out, "{}", message).map_err(StreamError::Write)?;
        self.decoded += 1;

        if let Some(summary) = self.summary.as_mut() {
            summary.record(message.type_tag());
        }

        Ok(())
    }

    fn transition(&mut self, next: LoopState) {
        tracing::trace!(from = ?self.state, to = ?next, "stream loop state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fmt;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};

    /// Lines look like "TAG:body"; anything else fails to decode
    struct StubDecoder {
        calls: Cell<usize>,
        interrupt_after: Option<(usize, InterruptFlag)>,
    }

    impl StubDecoder {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                interrupt_after: None,
            }
        }

        fn interrupting(after: usize, flag: InterruptFlag) -> Self {
            Self {
                calls: Cell::new(0),
                interrupt_after: Some((after, flag)),
            }
        }
    }

    struct StubMessage {
        tag: String,
        body: String,
    }

    impl fmt::Display for StubMessage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "[{}] {}", self.tag, self.body)
        }
    }

    impl DecodedMessage for StubMessage {
        fn type_tag(&self) -> &str {
            &self.tag
        }
    }

    #[derive(Debug, Error)]
    #[error("not a stub message")]
    struct StubError;

    impl Decoder for StubDecoder {
        type Message = StubMessage;
        type Error = StubError;

        fn decode(&self, line: &[u8]) -> Result<StubMessage, StubError> {
            self.calls.set(self.calls.get() + 1);
            if let Some((after, flag)) = &self.interrupt_after {
                if self.calls.get() == *after {
                    flag.request();
                }
            }

            let text = std::str::from_utf8(line).map_err(|_| StubError)?;
            let (tag, body) = text.split_once(':').ok_or(StubError)?;
            Ok(StubMessage {
                tag: tag.to_string(),
                body: body.to_string(),
            })
        }
    }

    async fn run_lines(
        stream: &mut StreamLoop<&StubDecoder>,
        data: &[u8],
    ) -> (RunOutcome, String, u64) {
        let mut reader = data;
        let mut input = InputSource::from_reader(&mut reader);
        let mut out = Vec::new();
        let outcome = stream.run(&mut input, &mut out).await;
        (outcome, String::from_utf8(out).unwrap(), input.lines_read())
    }

    #[tokio::test]
    async fn test_renders_every_line_in_order() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new());
        let (outcome, out, _) = run_lines(&mut stream, b"D:one\n8:two\nD:three\n").await;

        assert!(matches!(outcome.reason, StopReason::EndOfStream));
        assert_eq!(stream.state(), LoopState::Stopped);
        assert_eq!(outcome.decoded, 3);
        assert_eq!(out, "[D] one\n[8] two\n[D] three\n");
        assert!(outcome.summary.is_none());
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new());
        let (outcome, out, lines) = run_lines(&mut stream, b"\nD:one\n\n\r\nD:two\n\n").await;

        assert_eq!(outcome.decoded, 2);
        assert_eq!(out.lines().count(), 2);
        assert_eq!(lines, 6);
        assert_eq!(decoder.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_offset_skips_prefix() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new()).with_offset(4);
        let (outcome, out, _) = run_lines(&mut stream, b"t=1 D:one\nabc\nabcd\nt=2 8:two\n").await;

        // "abc" and "abcd" are no longer than the offset: skipped, never decoded
        assert_eq!(outcome.decoded, 2);
        assert_eq!(out, "[D] one\n[8] two\n");
        assert_eq!(decoder.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_summary_counts_match_total() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new()).with_summary(true);
        let (outcome, _, _) = run_lines(&mut stream, b"D:a\n0:b\nD:c\n\n8:d\nD:e\n").await;

        let summary = outcome.summary.unwrap();
        let entries: Vec<_> = summary.entries().collect();
        assert_eq!(entries, vec![("D", 3), ("0", 1), ("8", 1)]);
        assert_eq!(summary.total(), outcome.decoded);
    }

    #[tokio::test]
    async fn test_summary_disabled_is_absent() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new()).with_summary(false);
        let (outcome, _, _) = run_lines(&mut stream, b"D:a\n").await;
        assert!(outcome.summary.is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_stops_the_loop() {
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new()).with_summary(true);
        let (outcome, out, lines) = run_lines(&mut stream, b"D:one\n8:two\ngarbage\nD:four\n").await;

        match &outcome.reason {
            StopReason::Failed(StreamError::Decode { line, source }) => {
                assert_eq!(*line, 3);
                assert_eq!(source.to_string(), "not a stub message");
            }
            other => panic!("unexpected stop reason: {:?}", other),
        }
        assert_eq!(stream.state(), LoopState::Stopped);
        assert_eq!(outcome.decoded, 2);
        assert_eq!(out, "[D] one\n[8] two\n");
        assert_eq!(lines, 3);
        assert_eq!(outcome.summary.unwrap().total(), 2);
    }

    #[tokio::test]
    async fn test_interrupt_after_k_lines() {
        let flag = InterruptFlag::new();
        let decoder = StubDecoder::interrupting(2, flag.clone());
        let mut stream = StreamLoop::new(&decoder, flag);
        let (outcome, out, lines) = run_lines(&mut stream, b"D:1\nD:2\nD:3\nD:4\n").await;

        assert!(matches!(outcome.reason, StopReason::Interrupted));
        assert_eq!(stream.state(), LoopState::Interrupted);
        assert_eq!(outcome.decoded, 2);
        assert_eq!(out, "[D] 1\n[D] 2\n");
        assert_eq!(lines, 2);
    }

    #[tokio::test]
    async fn test_interrupt_before_start_reads_nothing() {
        let flag = InterruptFlag::new();
        flag.request();
        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, flag);
        let (outcome, out, lines) = run_lines(&mut stream, b"D:1\n").await;

        assert!(matches!(outcome.reason, StopReason::Interrupted));
        assert_eq!(outcome.decoded, 0);
        assert!(out.is_empty());
        assert_eq!(lines, 0);
    }

    #[tokio::test]
    async fn test_interrupt_wakes_pending_read() {
        let (client, mut server) = tokio::io::duplex(64);
        server.write_all(b"D:live\n").await.unwrap();

        let flag = InterruptFlag::new();
        let listener = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            listener.request();
        });

        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, flag);
        let mut reader = BufReader::new(client);
        let mut input = InputSource::from_reader(&mut reader);
        let mut out = Vec::new();

        let outcome = tokio::time::timeout(Duration::from_secs(5), stream.run(&mut input, &mut out))
            .await
            .expect("pending read was not interrupted");

        assert!(matches!(outcome.reason, StopReason::Interrupted));
        assert_eq!(outcome.decoded, 1);
        assert_eq!(out, b"[D] live\n");
        drop(server);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        struct BrokenPipe;

        impl Write for BrokenPipe {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let decoder = StubDecoder::new();
        let mut stream = StreamLoop::new(&decoder, InterruptFlag::new());
        let mut reader: &[u8] = b"D:1\nD:2\n";
        let mut input = InputSource::from_reader(&mut reader);
        let outcome = stream.run(&mut input, &mut BrokenPipe).await;

        assert!(matches!(
            outcome.reason,
            StopReason::Failed(StreamError::Write(_))
        ));
        assert_eq!(outcome.decoded, 0);
        assert_eq!(input.lines_read(), 1);
    }

    #[test]
    fn test_new_loop_is_running() {
        let decoder = StubDecoder::new();
        let stream = StreamLoop::new(&decoder, InterruptFlag::new());
        assert_eq!(stream.state(), LoopState::Running);
    }
}

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::events::{AnswerDelta, DecodedAnswer, StreamEventKind, StreamFailure, StreamRecord};

const DATA_PREFIX: &str = "data:";
const LOG_PREVIEW_CHARS: usize = 120;

/// Incremental decoder for newline-delimited `data: {json}` answer streams.
///
/// Bytes are buffered until a `\n` arrives, so chunks may split a record, or a
/// multi-byte character, anywhere. The aggregate answer and latched ids do not
/// depend on how the input was chunked.
#[derive(Debug, Default)]
pub struct AnswerStreamDecoder {
    buffer: Vec<u8>,
    state: DecodedAnswer,
    failure: Option<StreamFailure>,
    skipped: usize,
    /// High surrogate that ended the previous record's text.
    carried_high_surrogate: Option<u16>,
}

impl AnswerStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed arbitrary bytes and drain the deltas of every completed record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AnswerDelta> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            if let Some(delta) = self.decode_line(&line[..split]) {
                deltas.push(delta);
            }
        }

        deltas
    }

    /// Flush a trailing record that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<AnswerDelta> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    /// Decode a complete payload in one shot.
    pub fn decode_all(input: &str) -> DecodedAnswer {
        let mut decoder = Self::new();
        decoder.feed(input.as_bytes());
        decoder.finish();
        decoder.into_answer()
    }

    pub fn answer(&self) -> &str {
        &self.state.answer
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.state.conversation_id.as_deref()
    }

    /// First service-reported failure, if any.
    pub fn failure(&self) -> Option<&StreamFailure> {
        self.failure.as_ref()
    }

    /// Records dropped because they could not be parsed.
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    pub fn into_answer(self) -> DecodedAnswer {
        self.state
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<AnswerDelta> {
        let line = String::from_utf8_lossy(raw);
        let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() {
            return None;
        }

        let repaired = repair_double_escaped_unicode(payload);
        let joined = join_split_surrogates(&repaired, &mut self.carried_high_surrogate);
        let record = match serde_json::from_str::<StreamRecord>(&joined) {
            Ok(record) => record,
            Err(error) => {
                self.skipped += 1;
                warn!(
                    %error,
                    record = %preview(payload),
                    "skipping malformed stream record"
                );
                return None;
            }
        };

        Some(self.apply(record))
    }

    fn apply(&mut self, record: StreamRecord) -> AnswerDelta {
        let event = StreamEventKind::parse(&record.event);
        let conversation_id = non_blank(record.conversation_id);

        if let Some(id) = conversation_id.as_deref() {
            match self.state.conversation_id.as_deref() {
                None => self.state.conversation_id = Some(id.to_owned()),
                Some(latched) if latched != id => {
                    debug!(latched, ignored = id, "conversation id already latched");
                }
                Some(_) => {}
            }
        }
        if self.state.message_id.is_none() {
            self.state.message_id = non_blank(record.message_id);
        }

        let mut text = String::new();
        match &event {
            kind if kind.contributes_text() => {
                text = record.answer.unwrap_or_default();
                self.state.answer.push_str(&text);
            }
            StreamEventKind::MessageEnd => {
                self.state.completed = true;
                if let Some(metadata) = record.metadata {
                    self.state.retriever_resources = metadata.retriever_resources;
                }
            }
            StreamEventKind::Error => {
                if self.failure.is_none() {
                    self.failure = Some(StreamFailure {
                        code: non_blank(record.code),
                        message: record
                            .message
                            .unwrap_or_else(|| "stream reported an error".to_owned()),
                        status: record.status,
                    });
                }
            }
            _ => {}
        }

        AnswerDelta {
            event,
            text,
            conversation_id,
        }
    }
}

/// Rewrite `\\uXXXX` (an escaped backslash followed by `uXXXX`) into the JSON
/// escape `\uXXXX`, so the parser yields the character instead of the literal
/// six-character text. Surrogate pairs are recombined by the JSON parser.
///
/// Runs of backslashes are counted: an odd run already ends in a real escape
/// and is left untouched.
pub fn repair_double_escaped_unicode(input: &str) -> Cow<'_, str> {
    if !input.contains("\\\\u") {
        return Cow::Borrowed(input);
    }

    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut index = 0;
    let mut copied_from = 0;

    while index < bytes.len() {
        if bytes[index] != b'\\' {
            index += 1;
            continue;
        }

        let run_start = index;
        while index < bytes.len() && bytes[index] == b'\\' {
            index += 1;
        }
        let run = index - run_start;

        if run >= 2 && run % 2 == 0 && is_unicode_escape_body(&bytes[index..]) {
            out.push_str(&input[copied_from..run_start]);
            out.push_str(&input[run_start..index - 1]);
            copied_from = index;
        }
    }

    out.push_str(&input[copied_from..]);
    Cow::Owned(out)
}

/// Make every `\uXXXX` surrogate escape in `input` parseable.
///
/// The service may split an astral character between two records, leaving a
/// lone high surrogate at the end of one string and a lone low surrogate at
/// the start of the next. A lone high surrogate that closes a string is
/// removed and stored in `carried`; the next record's first lone low
/// surrogate is rewritten into the full pair. Any other lone surrogate
/// becomes U+FFFD. A carried surrogate only survives one record.
pub fn join_split_surrogates<'a>(input: &'a str, carried: &mut Option<u16>) -> Cow<'a, str> {
    let mut previous = carried.take();
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut copied_from = 0;
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] != b'\\' {
            index += 1;
            continue;
        }

        let run_start = index;
        while index < bytes.len() && bytes[index] == b'\\' {
            index += 1;
        }
        if (index - run_start) % 2 == 0 {
            continue;
        }
        let Some(unit) = escaped_code_unit(&bytes[index..]) else {
            continue;
        };
        let escape_start = index - 1;
        let escape_end = index + 5;

        match unit {
            0xD800..=0xDBFF => {
                let paired = bytes.get(escape_end) == Some(&b'\\')
                    && escaped_code_unit(&bytes[escape_end + 1..])
                        .is_some_and(|next| (0xDC00..=0xDFFF).contains(&next));
                if paired {
                    index = escape_end + 6;
                    continue;
                }
                out.push_str(&input[copied_from..escape_start]);
                if bytes.get(escape_end) == Some(&b'"') {
                    *carried = Some(unit);
                } else {
                    out.push_str(REPLACEMENT_ESCAPE);
                }
                copied_from = escape_end;
            }
            0xDC00..=0xDFFF => {
                out.push_str(&input[copied_from..escape_start]);
                match previous.take() {
                    Some(high) => out.push_str(&format!("\\u{high:04x}\\u{unit:04x}")),
                    None => out.push_str(REPLACEMENT_ESCAPE),
                }
                copied_from = escape_end;
            }
            _ => {}
        }
        index = escape_end;
    }

    if copied_from == 0 {
        return Cow::Borrowed(input);
    }
    out.push_str(&input[copied_from..]);
    Cow::Owned(out)
}

const REPLACEMENT_ESCAPE: &str = "\\ufffd";

fn escaped_code_unit(rest: &[u8]) -> Option<u16> {
    if !is_unicode_escape_body(rest) {
        return None;
    }
    let hex = std::str::from_utf8(&rest[1..5]).ok()?;
    u16::from_str_radix(hex, 16).ok()
}

fn is_unicode_escape_body(rest: &[u8]) -> bool {
    rest.len() >= 5 && rest[0] == b'u' && rest[1..5].iter().all(u8::is_ascii_hexdigit)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn preview(payload: &str) -> String {
    if payload.chars().count() <= LOG_PREVIEW_CHARS {
        return payload.to_owned();
    }
    let mut out: String = payload.chars().take(LOG_PREVIEW_CHARS).collect();
    out.push('…');
    out
}

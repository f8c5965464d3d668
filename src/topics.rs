//! Camera stream → bag topic resolution.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::rosbags_io::{BagReader, Topic};

/// Camera streams recorded by the vehicle, in extraction order.
pub const CAMERA_STREAMS: &[&str] = &[
    "front_left",
    "front_right",
    "front_left_center",
    "front_right_center",
    "rear_left",
    "rear_right",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    #[default]
    Compressed,
    Raw,
}

impl TopicKind {
    pub fn suffix(self) -> &'static str {
        match self {
            TopicKind::Compressed => "image/compressed",
            TopicKind::Raw => "image",
        }
    }
}

pub fn is_known_stream(name: &str) -> bool {
    CAMERA_STREAMS.contains(&name)
}

/// SQL `LIKE` pattern (escape char `\`) matching the stream's topic under any namespace.
pub fn topic_pattern(stream: &str, kind: TopicKind) -> String {
    let mut escaped = String::with_capacity(stream.len());
    for c in stream.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("%/camera/{escaped}/{}", kind.suffix())
}

/// Find the topic carrying `stream`.
///
/// Returns [`ExtractError::StreamAbsent`] when the bag has no such topic.
/// When several namespaces match, the lowest topic id wins.
pub fn resolve_topic(
    reader: &mut BagReader,
    stream: &str,
    kind: TopicKind,
) -> Result<Topic, ExtractError> {
    let pattern = topic_pattern(stream, kind);
    let mut matches = reader
        .find_topics(&pattern)
        .map_err(|e| ExtractError::handle(reader.path(), e))?;
    if matches.is_empty() {
        return Err(ExtractError::StreamAbsent {
            stream: stream.to_string(),
            pattern,
        });
    }
    if matches.len() > 1 {
        let names: Vec<&str> = matches.iter().map(|t| t.name.as_str()).collect();
        tracing::warn!(stream, ?names, "several topics match; using the first");
    }
    let topic = matches.swap_remove(0);
    tracing::debug!(stream, topic = %topic.name, id = topic.id, "resolved topic");
    Ok(topic)
}

/// Print the known camera streams and the topics they resolve to.
pub fn print_streams() -> Result<()> {
    println!("Known camera streams:");
    println!("---------------------------------------------------------------");

    for stream in CAMERA_STREAMS {
        println!(
            "{:<20} → {:<45} {}",
            stream,
            format!("*/camera/{stream}/{}", TopicKind::Compressed.suffix()),
            format!("{stream}/{stream}_<n>.jpeg"),
        );
    }
    println!();
    println!("With --raw the topic suffix is /{}.", TopicKind::Raw.suffix());

    Ok(())
}

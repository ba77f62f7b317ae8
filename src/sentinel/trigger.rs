use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

const OPEN_TOKEN: &str = "&&$47";
const CLOSE_TOKEN: &str = "$&47";

fn opener_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)&&\$47").expect("valid regex"))
}

/// An opener with no `$` after it, running to the end of the buffer.
fn partial_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)&&\$47\s*([^$]*)$").expect("valid regex"))
}

/// A complete marker found in observed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub id: u64,
    pub goal: String,
}

/// Finds the first `<id>$&47` closer at or after `from` whose id is not the
/// tail of a longer number.
fn find_closer(text: &str, id: &str, from: usize) -> Option<usize> {
    let needle = format!("{id}{CLOSE_TOKEN}");
    let mut pos = from;
    while let Some(rel) = text.get(pos..)?.find(&needle) {
        let at = pos + rel;
        let boundary = at == from || !text[..at].ends_with(|c: char| c.is_ascii_digit());
        if boundary {
            return Some(at);
        }
        pos = at + needle.len();
    }
    None
}

/// Start of the body after the last `<id>&&$47` opener inside `from..to`,
/// skipping openers whose id is the tail of a longer number.
fn last_reopen(text: &str, id: &str, from: usize, to: usize) -> Option<usize> {
    let needle = format!("{id}{OPEN_TOKEN}");
    text.get(from..to)?
        .rmatch_indices(&needle)
        .map(|(rel, _)| from + rel)
        .find(|&at| !text[..at].ends_with(|c: char| c.is_ascii_digit()))
        .map(|at| at + needle.len())
}

/// Complete markers with the byte range each one covers, stale openers
/// included.
///
/// An opener's id is its whole digit run: `115&&$47` opens marker 115 only,
/// mirroring the rule for closers. When the same opener shows up again
/// before the closer (streamed text seen across cycles), the body starts at
/// the last one.
fn marker_spans(text: &str) -> Vec<(Range<usize>, Trigger)> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(caps) = opener_pattern().captures_at(text, pos) {
        let (Some(whole), Some(id_match)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let id_str = id_match.as_str();
        let body_start = whole.end();

        match (find_closer(text, id_str, body_start), id_str.parse::<u64>()) {
            (Some(close_at), Ok(id)) => {
                let body_start = last_reopen(text, id_str, body_start, close_at).unwrap_or(body_start);
                let end = close_at + id_str.len() + CLOSE_TOKEN.len();
                found.push((
                    whole.start()..end,
                    Trigger {
                        id,
                        goal: text[body_start..close_at].trim().to_string(),
                    },
                ));
                pos = end;
            }
            _ => pos = body_start,
        }
    }

    found
}

/// Every complete marker in `text`, in reading order. Markers do not
/// overlap: scanning resumes after each closer.
pub fn find_markers(text: &str) -> Vec<Trigger> {
    marker_spans(text).into_iter().map(|(_, t)| t).collect()
}

/// `text` with every complete marker cut out, so a marker cannot satisfy a
/// search for its own goal text.
pub fn strip_markers(text: &str) -> String {
    let mut kept = Vec::new();
    let mut pos = 0;
    for (span, _) in marker_spans(text) {
        kept.push(&text[pos..span.start]);
        pos = span.end;
    }
    kept.push(&text[pos..]);
    kept.iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Watches the rolling text buffer for markers and hands out at most one new
/// marker per observation, lowest id first. Every id is handed out once for
/// the life of the detector.
#[derive(Debug)]
pub struct TriggerDetector {
    history: VecDeque<String>,
    capacity: usize,
    executed: HashSet<u64>,
    /// Markers whose opener is visible but whose closer has not appeared yet.
    pending: BTreeMap<u64, String>,
}

impl TriggerDetector {
    pub fn new(history_cycles: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(history_cycles.max(1)),
            capacity: history_cycles.max(1),
            executed: HashSet::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Feeds one observation and returns the marker to dispatch this cycle.
    /// The returned id is already recorded as executed.
    pub fn observe(&mut self, text: &str) -> Option<Trigger> {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(text.to_string());
        let buffer = self.buffer();

        self.track_partial(&buffer);
        self.complete_pending(text);

        let mut fresh: Vec<Trigger> = find_markers(&buffer)
            .into_iter()
            .filter(|t| !self.executed.contains(&t.id))
            .collect();
        fresh.sort_by_key(|t| t.id);
        fresh.dedup_by_key(|t| t.id);

        let next = fresh.into_iter().next()?;
        self.executed.insert(next.id);
        self.pending.remove(&next.id);
        tracing::info!(id = next.id, goal = %next.goal, "marker selected");
        Some(next)
    }

    /// The last few observations joined with single spaces.
    pub fn buffer(&self) -> String {
        self.history.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    pub fn is_executed(&self, id: u64) -> bool {
        self.executed.contains(&id)
    }

    pub fn pending(&self) -> impl Iterator<Item = (&u64, &String)> {
        self.pending.iter()
    }

    fn track_partial(&mut self, buffer: &str) {
        let Some(caps) = partial_pattern().captures(buffer) else {
            return;
        };
        let Ok(id) = caps[1].parse::<u64>() else {
            return;
        };
        if self.pending.contains_key(&id) || self.executed.contains(&id) {
            return;
        }
        if buffer.contains(&format!("{id}{CLOSE_TOKEN}")) {
            return;
        }
        let partial = caps[2].trim().to_string();
        tracing::info!(id, partial = %partial, "partial marker, waiting for its closer");
        self.pending.insert(id, partial);
    }

    /// A pending marker whose closer shows up in the current observation is
    /// logged and dropped. It is dispatched only when the full-match pass sees
    /// the whole span, so it can never run twice.
    fn complete_pending(&mut self, current: &str) {
        let ids: Vec<u64> = self.pending.keys().copied().collect();
        for id in ids {
            let Some(close_at) = find_closer(current, &id.to_string(), 0) else {
                continue;
            };
            if let Some(partial) = self.pending.remove(&id) {
                let goal = match last_reopen(current, &id.to_string(), 0, close_at) {
                    Some(body_start) => current[body_start..close_at].trim().to_string(),
                    None => format!("{} {}", partial, current[..close_at].trim()),
                };
                tracing::info!(id, goal = %goal.trim(), "pending marker completed");
            }
        }
    }
}

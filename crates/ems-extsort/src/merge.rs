//! Forward-only merge cursors over sorted runs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::BufReader;

use ems_core::EmsError;
use serde::de::DeserializeOwned;

use crate::sorter::sort_error;

pub(crate) enum Source<'a, T> {
    Spill {
        reader: BufReader<File>,
        remaining: usize,
    },
    Tail {
        iter: std::slice::Iter<'a, T>,
    },
}

impl<'a, T> Source<'a, T> {
    pub(crate) fn spill(file: File, len: usize) -> Self {
        Source::Spill {
            reader: BufReader::new(file),
            remaining: len,
        }
    }

    pub(crate) fn tail(items: &'a [T]) -> Self {
        Source::Tail { iter: items.iter() }
    }
}

/// Heap entry; the source index breaks ties deterministically.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Head<T>(T, usize);

/// K-way merge cursor over the spilled runs and in-memory tail of a
/// [`crate::SortedRun`].
///
/// `peek` exposes the smallest unconsumed record so phase code can merge-join
/// several streams without buffering either side.
pub struct MergeStream<'a, T> {
    sources: Vec<Source<'a, T>>,
    heap: BinaryHeap<Reverse<Head<T>>>,
}

impl<'a, T: Ord + Clone + DeserializeOwned> MergeStream<'a, T> {
    pub(crate) fn new(sources: Vec<Source<'a, T>>) -> Result<Self, EmsError> {
        let mut stream = Self {
            sources,
            heap: BinaryHeap::new(),
        };
        for idx in 0..stream.sources.len() {
            stream.refill(idx)?;
        }
        Ok(stream)
    }

    fn refill(&mut self, idx: usize) -> Result<(), EmsError> {
        match &mut self.sources[idx] {
            Source::Spill { reader, remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    let item: T = bincode::deserialize_from(&mut *reader)
                        .map_err(|err| sort_error("spill-decode", err.to_string()))?;
                    self.heap.push(Reverse(Head(item, idx)));
                }
            }
            Source::Tail { iter } => {
                if let Some(item) = iter.next() {
                    self.heap.push(Reverse(Head(item.clone(), idx)));
                }
            }
        }
        Ok(())
    }

    /// Smallest unconsumed record, if any.
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(head)| &head.0)
    }

    /// Consumes and returns the smallest record.
    pub fn next_item(&mut self) -> Result<Option<T>, EmsError> {
        match self.heap.pop() {
            None => Ok(None),
            Some(Reverse(Head(item, idx))) => {
                self.refill(idx)?;
                Ok(Some(item))
            }
        }
    }
}

/// Merge cursor that also accepts records pushed for not-yet-reached keys.
///
/// This is the time-forward-processing primitive: while draining messages for
/// the current logical time, a phase pushes messages addressed to strictly
/// later times, and they surface in global sort order.
pub struct PushMerge<'a, T> {
    stream: MergeStream<'a, T>,
    pushed: BinaryHeap<Reverse<T>>,
}

impl<'a, T: Ord + Clone + DeserializeOwned> PushMerge<'a, T> {
    /// Wraps a base stream with an empty push buffer.
    pub fn new(stream: MergeStream<'a, T>) -> Self {
        Self {
            stream,
            pushed: BinaryHeap::new(),
        }
    }

    /// Inserts a record addressed to a later key.
    pub fn push(&mut self, item: T) {
        self.pushed.push(Reverse(item));
    }

    /// Smallest unconsumed record across the base stream and pushed records.
    pub fn peek(&self) -> Option<&T> {
        let from_stream = self.stream.peek();
        let from_pushed = self.pushed.peek().map(|Reverse(item)| item);
        match (from_stream, from_pushed) {
            (Some(a), Some(b)) => {
                if a <= b {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Consumes and returns the smallest record.
    pub fn next_item(&mut self) -> Result<Option<T>, EmsError> {
        let take_pushed = match (self.stream.peek(), self.pushed.peek()) {
            (Some(a), Some(Reverse(b))) => b < a,
            (None, Some(_)) => true,
            _ => false,
        };
        if take_pushed {
            Ok(self.pushed.pop().map(|Reverse(item)| item))
        } else {
            self.stream.next_item()
        }
    }
}

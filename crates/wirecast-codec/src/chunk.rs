//! Fixed-size chunking of a compressed envelope.
//!
//! A chunk stream is a sequence of `(slice, is_last)` pairs: consecutive
//! `size`-byte slices of the envelope, with the final slice shorter than
//! `size` and flagged as the end of the message.
//!
//! Convention for exact multiples: when the envelope length is an exact
//! multiple of `size` (including length zero), a zero-length terminal
//! slice is emitted with the end-of-message flag, so exactly one
//! end-of-message frame is always produced. The receive side mirrors
//! this: a frame shorter than `size` always terminates the message.

/// Number of chunks [`chunks`] will produce for `len` input bytes.
#[must_use]
pub fn chunk_count(len: usize, size: usize) -> usize {
    assert!(size > 0, "chunk size must be positive");
    if len % size == 0 {
        len / size + 1
    } else {
        len.div_ceil(size)
    }
}

/// Slice `envelope` into a chunk stream.
///
/// Pure function of its input: the returned iterator is restartable by
/// calling `chunks` again, and cloning it replays from the current
/// position.
///
/// # Panics
///
/// Panics if `size` is zero; the configuration surface guarantees a
/// positive chunk size.
#[must_use]
pub fn chunks(envelope: &[u8], size: usize) -> Chunks<'_> {
    assert!(size > 0, "chunk size must be positive");
    Chunks {
        data: envelope,
        size,
        offset: 0,
        done: false,
    }
}

/// Iterator over `(slice, is_last)` chunk pairs. See [`chunks`].
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    data: &'a [u8],
    size: usize,
    offset: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = (&'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let remaining = self.data.len() - self.offset;
        if remaining < self.size {
            self.done = true;
            return Some((&self.data[self.offset..], true));
        }
        let slice = &self.data[self.offset..self.offset + self.size];
        self.offset += self.size;
        Some((slice, false))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.done {
            0
        } else {
            chunk_count(self.data.len() - self.offset, self.size)
        };
        (left, Some(left))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

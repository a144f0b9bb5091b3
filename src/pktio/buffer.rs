//! The pktio read buffer (spec.md §3 "pktio state", §4.4 step 1, §4.4.1).

use crate::error::{AtError, AtResult};

/// Owns the worker's single read buffer. No other thread may touch this;
/// it is exclusively manipulated from the pktio worker thread (spec.md §5
/// "Shared-resource policy").
pub struct ReadBuffer {
    buf: Vec<u8>,
    capacity: usize,
    /// Offset of the first unprocessed byte.
    read_ptr: usize,
    /// Number of valid unprocessed bytes starting at `read_ptr`.
    partial_len: usize,
    /// Nonzero only while draining a binary payload of known size.
    data_length: usize,
}

impl ReadBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity], capacity, read_ptr: 0, partial_len: 0, data_length: 0 }
    }

    pub fn data_length(&self) -> usize {
        self.data_length
    }

    pub fn set_data_length(&mut self, n: usize) {
        self.data_length = n;
    }

    /// Compacts leftover unprocessed bytes to the front of the buffer, as
    /// done before every `recv` call when there is no pending response
    /// holding a reference into the buffer.
    pub fn compact(&mut self) {
        if self.read_ptr == 0 {
            return;
        }
        self.buf.copy_within(self.read_ptr..self.read_ptr + self.partial_len, 0);
        self.read_ptr = 0;
    }

    /// The currently empty region available for the next `recv` call.
    /// Reserves one trailing byte for the `\0` sentinel.
    pub fn empty_region_mut(&mut self) -> &mut [u8] {
        let start = self.read_ptr + self.partial_len;
        let end = self.capacity.saturating_sub(1);
        if start >= end {
            &mut []
        } else {
            &mut self.buf[start..end]
        }
    }

    /// Records that `n` bytes were received into the empty region, and
    /// appends the `\0` sentinel immediately after them.
    pub fn commit_received(&mut self, n: usize) {
        self.partial_len += n;
        let sentinel = self.read_ptr + self.partial_len;
        if sentinel < self.capacity {
            self.buf[sentinel] = 0;
        }
    }

    /// Resets the buffer to empty, discarding any unprocessed bytes. Used
    /// on a protocol error (spec.md §7, "An UNDEFINED message ... zeros the
    /// read buffer").
    pub fn reset(&mut self) {
        self.read_ptr = 0;
        self.partial_len = 0;
        self.data_length = 0;
        self.buf.iter_mut().for_each(|b| *b = 0);
    }

    /// The unprocessed region, as a slice.
    pub fn unprocessed(&self) -> &[u8] {
        &self.buf[self.read_ptr..self.read_ptr + self.partial_len]
    }

    /// Skips leading `\r`, `\n`, `\0` bytes (spec.md §4.4 step 3a).
    pub fn skip_leading_junk(&mut self) {
        while self.partial_len > 0 {
            let c = self.buf[self.read_ptr];
            if c == b'\r' || c == b'\n' || c == 0 {
                self.read_ptr += 1;
                self.partial_len -= 1;
            } else {
                break;
            }
        }
    }

    /// Finds the next `\n` in the unprocessed region, returning the offset
    /// (relative to `read_ptr`) of the byte *after* the terminator — i.e.
    /// the start of the remaining buffer — along with the line itself
    /// (trailing `\r` stripped).
    pub fn next_line(&self) -> Option<(&[u8], usize)> {
        let region = self.unprocessed();
        let nl = region.iter().position(|&b| b == b'\n')?;
        let mut end = nl;
        if end > 0 && region[end - 1] == b'\r' {
            end -= 1;
        }
        Some((&region[..end], nl + 1))
    }

    /// Advances `read_ptr`/`partial_len` past `n` consumed bytes.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.partial_len);
        self.read_ptr += n;
        self.partial_len -= n;
    }

    /// Advances past an already-consumed raw data region, as an alternative
    /// entry point used by [`Self::drain_data`].
    fn advance_from(&mut self, start_of_data_offset: usize, n: usize) {
        self.read_ptr += start_of_data_offset + n;
        self.partial_len -= start_of_data_offset + n;
    }

    /// Drains a binary payload of `self.data_length()` bytes starting
    /// `start_of_data_offset` bytes into the unprocessed region (spec.md
    /// §4.4.1 `handle_data`).
    ///
    /// Returns `Ok(Some(bytes))` once the full payload has arrived (and
    /// clears `data_length`), or `Ok(None)` if the fragment must be parked
    /// for the next `RX_DATA` wakeup — in which case this call has already
    /// repositioned `read_ptr`/`partial_len` to the parked remainder.
    pub fn drain_data(&mut self, start_of_data_offset: usize) -> AtResult<Option<Vec<u8>>> {
        let needed = self.data_length;
        if needed == 0 {
            return Err(AtError::Error);
        }
        let available = self.partial_len.saturating_sub(start_of_data_offset);
        if available >= needed {
            let start = self.read_ptr + start_of_data_offset;
            let bytes = self.buf[start..start + needed].to_vec();
            self.advance_from(start_of_data_offset, needed);
            self.data_length = 0;
            Ok(Some(bytes))
        } else {
            // Park: the unprocessed region from start_of_data_offset on is
            // exactly the partial fragment we still need to grow.
            self.read_ptr += start_of_data_offset;
            self.partial_len = available;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_leading_junk_eats_crlf_and_nul() {
        let mut b = ReadBuffer::new(64);
        b.empty_region_mut()[..7].copy_from_slice(b"\r\n\0OK\r\n");
        b.commit_received(7);
        b.skip_leading_junk();
        assert_eq!(b.unprocessed(), b"OK\r\n");
    }

    #[test]
    fn next_line_strips_trailing_cr() {
        let mut b = ReadBuffer::new(64);
        b.empty_region_mut()[..4].copy_from_slice(b"OK\r\n");
        b.commit_received(4);
        let (line, consumed) = b.next_line().unwrap();
        assert_eq!(line, b"OK");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn binary_payload_split_across_two_reads() {
        let mut b = ReadBuffer::new(64);
        b.set_data_length(10);
        b.empty_region_mut()[..4].copy_from_slice(b"ABCD");
        b.commit_received(4);
        assert_eq!(b.drain_data(0).unwrap(), None);
        assert_eq!(b.unprocessed(), b"ABCD");

        b.compact();
        b.empty_region_mut()[..6].copy_from_slice(b"EFGHIJ");
        b.commit_received(6);
        let got = b.drain_data(0).unwrap().unwrap();
        assert_eq!(got, b"ABCDEFGHIJ");
        assert_eq!(b.data_length(), 0);
        assert_eq!(b.unprocessed(), b"");
    }

    #[test]
    fn compact_moves_leftover_to_front() {
        let mut b = ReadBuffer::new(16);
        b.empty_region_mut()[..6].copy_from_slice(b"OK\r\nAB");
        b.commit_received(6);
        b.advance(4);
        assert_eq!(b.unprocessed(), b"AB");
        b.compact();
        assert_eq!(b.unprocessed(), b"AB");
        assert_eq!(b.empty_region_mut().len(), 13);
    }
}

//! Ogg page reader and codec probes.
//!
//! Parses an Ogg bitstream into pages and reassembled packets, identifies
//! the carried codec (Opus or Vorbis), and supports granule-based seeking.
//! Hand-rolled rather than delegated to the `ogg` crate so the segment
//! reassembly across page boundaries and the bisection seek are under our
//! own control.

pub mod probe;

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const PAGE_HEADER_LEN: usize = 27;

/// One parsed Ogg page header plus its raw segment table and data.
#[derive(Debug, Clone)]
pub struct Page {
    pub granule_position: i64,
    pub serial_number: u32,
    pub sequence_number: u32,
    /// Offset of this page's first header byte within the stream.
    pub byte_offset: u64,
    pub header_type: u8,
    pub segment_table: Vec<u8>,
    pub data: Vec<u8>,
}

impl Page {
    pub fn is_continued(&self) -> bool {
        self.header_type & 0x01 != 0
    }

    pub fn is_first(&self) -> bool {
        self.header_type & 0x02 != 0
    }

    pub fn is_last(&self) -> bool {
        self.header_type & 0x04 != 0
    }

    /// Splits this page's data into packet runs per the segment table: a run
    /// ends at the first segment shorter than 255 bytes (including a
    /// terminating 0-length segment, which yields a valid empty run). If the
    /// page's last segment is exactly 255 bytes, the final run is left open
    /// (`ends_open = true`) and must be joined with the next page.
    fn split_into_runs(&self) -> (Vec<Vec<u8>>, bool) {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        let mut offset = 0usize;
        for &seg_len in &self.segment_table {
            let len = seg_len as usize;
            let end = (offset + len).min(self.data.len());
            current.extend_from_slice(&self.data[offset..end]);
            offset = end;
            if seg_len < 255 {
                runs.push(std::mem::take(&mut current));
            }
        }
        let ends_open = self.segment_table.last() == Some(&255);
        if ends_open {
            runs.push(current);
        }
        (runs, ends_open)
    }
}

/// Reads Ogg pages from a seekable byte source and reassembles packets,
/// carrying a partial packet across page boundaries as described in §4.1.
pub struct PageReader<R> {
    reader: R,
    position: u64,
    /// Bytes of a packet opened by a previous page, awaiting continuation.
    partial: Vec<u8>,
    partial_open: bool,
    /// Packets completed while processing one page, drained before reading another.
    pending: std::collections::VecDeque<Vec<u8>>,
}

impl<R: Read + Seek> PageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            partial: Vec::new(),
            partial_open: false,
            pending: std::collections::VecDeque::new(),
        }
    }

    /// Reads exactly the next page starting at the current stream position.
    pub fn read_page(&mut self) -> Result<Option<Page>> {
        let byte_offset = self.position;
        let mut header = [0u8; PAGE_HEADER_LEN];
        let n = read_fill(&mut self.reader, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n != PAGE_HEADER_LEN {
            return Err(Error::TruncatedHeader);
        }
        self.position += PAGE_HEADER_LEN as u64;

        if &header[0..4] != CAPTURE_PATTERN {
            return Err(Error::InvalidContainer);
        }
        if header[4] != 0 {
            return Err(Error::InvalidContainer);
        }
        let header_type = header[5];
        let granule_position = i64::from_le_bytes(header[6..14].try_into().unwrap());
        let serial_number = u32::from_le_bytes(header[14..18].try_into().unwrap());
        let sequence_number = u32::from_le_bytes(header[18..22].try_into().unwrap());
        let num_segments = header[26] as usize;

        let mut segment_table = vec![0u8; num_segments];
        if read_fill(&mut self.reader, &mut segment_table)? != num_segments {
            return Err(Error::TruncatedHeader);
        }
        self.position += num_segments as u64;

        let data_len: usize = segment_table.iter().map(|&v| v as usize).sum();
        let mut data = vec![0u8; data_len];
        if read_fill(&mut self.reader, &mut data)? != data_len {
            return Err(Error::TruncatedHeader);
        }
        self.position += data_len as u64;

        Ok(Some(Page {
            granule_position,
            serial_number,
            sequence_number,
            byte_offset,
            header_type,
            segment_table,
            data,
        }))
    }

    /// Pulls the next complete, reassembled packet, or `None` at end of stream.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Ok(Some(packet));
            }

            let Some(page) = self.read_page()? else {
                return Ok(if self.partial_open && !self.partial.is_empty() {
                    self.partial_open = false;
                    Some(std::mem::take(&mut self.partial))
                } else {
                    None
                });
            };

            let (runs, page_ends_open) = page.split_into_runs();
            if runs.is_empty() {
                continue;
            }
            let last_index = runs.len() - 1;

            for (i, run) in runs.into_iter().enumerate() {
                let is_last_run = i == last_index;
                if i == 0 && self.partial_open {
                    self.partial.extend_from_slice(&run);
                    if !(is_last_run && page_ends_open) {
                        self.pending.push_back(std::mem::take(&mut self.partial));
                        self.partial_open = false;
                    }
                } else if is_last_run && page_ends_open {
                    self.partial = run;
                    self.partial_open = true;
                } else {
                    self.pending.push_back(run);
                }
            }
        }
    }

    pub fn seek_to_byte(&mut self, offset: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(Error::from)?;
        self.position = offset;
        self.partial.clear();
        self.partial_open = false;
        self.pending.clear();
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]).map_err(Error::from)? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

/// Scans forward from `from` for the next page's byte offset and granule
/// position, used by the bisection seek below.
fn scan_next_page<R: Read + Seek>(
    source: &mut R,
    from: u64,
) -> Result<Option<(u64, i64)>> {
    source.seek(SeekFrom::Start(from)).map_err(Error::from)?;
    let mut pos = from;
    let mut byte = [0u8; 1];
    let mut matched = 0usize;
    loop {
        let n = source.read(&mut byte).map_err(Error::from)?;
        if n == 0 {
            return Ok(None);
        }
        if byte[0] == CAPTURE_PATTERN[matched] {
            matched += 1;
        } else {
            matched = if byte[0] == CAPTURE_PATTERN[0] { 1 } else { 0 };
        }
        pos += 1;
        if matched == 4 {
            let page_start = pos - 4;
            source.seek(SeekFrom::Start(page_start + 6)).map_err(Error::from)?;
            let mut granule_bytes = [0u8; 8];
            if read_fill(source, &mut granule_bytes)? != 8 {
                return Ok(None);
            }
            let granule = i64::from_le_bytes(granule_bytes);
            return Ok(Some((page_start, granule)));
        }
    }
}

/// Bisects the byte range `[data_start, file_size)` for the latest page whose
/// granule position is ≤ `target`. Returns that page's byte offset and its
/// own granule position, so a caller can tell how far short of `target` the
/// landed page actually sits.
pub fn seek_by_granule<R: Read + Seek>(
    source: &mut R,
    data_start: u64,
    file_size: u64,
    target: i64,
) -> Result<(u64, i64)> {
    let mut lo = data_start;
    let mut hi = file_size;
    let mut best = (data_start, -1i64);

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match scan_next_page(source, mid)? {
            None => {
                hi = mid;
            }
            Some((offset, granule)) => {
                if granule <= target {
                    best = (offset, granule);
                    if offset + 1 >= hi {
                        break;
                    }
                    lo = offset + 1;
                } else {
                    if mid <= data_start {
                        break;
                    }
                    hi = mid;
                }
            }
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_page(granule: i64, serial: u32, seq: u32, segment_lens: &[u8], data: &[u8]) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(CAPTURE_PATTERN);
        page.push(0); // version
        page.push(0); // header type: fresh packet start
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&seq.to_le_bytes());
        page.extend_from_slice(&0u32.to_le_bytes()); // checksum, unchecked
        page.push(segment_lens.len() as u8);
        page.extend_from_slice(segment_lens);
        page.extend_from_slice(data);
        page
    }

    #[test]
    fn single_page_single_packet() {
        let data = vec![1, 2, 3, 4, 5];
        let page = build_page(0, 42, 0, &[5], &data);
        let mut reader = PageReader::new(Cursor::new(page));
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet, data);
        assert!(reader.next_packet().unwrap().is_none());
    }

    #[test]
    fn multi_page_opus_packet_is_byte_identical_concatenation() {
        // Three pages with segment tables [255,255], [255,255], [100]
        // produce one packet of exactly 1,120 bytes.
        let body_a: Vec<u8> = (0u8..255).cycle().take(510).collect();
        let body_b: Vec<u8> = (10u8..265).map(|v| v as u8).cycle().take(510).collect();
        let body_c: Vec<u8> = (0u8..100).collect();

        let mut stream = Vec::new();
        stream.extend(build_page(-1, 7, 0, &[255, 255], &body_a));
        stream.extend(build_page(-1, 7, 1, &[255, 255], &body_b));
        stream.extend(build_page(960, 7, 2, &[100], &body_c));

        let mut reader = PageReader::new(Cursor::new(stream));
        let packet = reader.next_packet().unwrap().unwrap();
        assert_eq!(packet.len(), 1_120);
        let expected: Vec<u8> = body_a
            .iter()
            .chain(body_b.iter())
            .chain(body_c.iter())
            .copied()
            .collect();
        assert_eq!(packet, expected);
    }

    #[test]
    fn zero_length_terminating_segment_yields_empty_packet() {
        let page = build_page(0, 1, 0, &[0], &[]);
        let mut reader = PageReader::new(Cursor::new(page));
        let packet = reader.next_packet().unwrap().unwrap();
        assert!(packet.is_empty());
    }

    #[test]
    fn bad_capture_pattern_is_invalid_container() {
        let mut bogus = vec![b'X', b'X', b'X', b'X'];
        bogus.extend(std::iter::repeat(0u8).take(23));
        let mut reader = PageReader::new(Cursor::new(bogus));
        let err = reader.read_page().unwrap_err();
        assert!(matches!(err, Error::InvalidContainer));
    }

    #[test]
    fn seek_by_granule_finds_latest_page_at_or_before_target() {
        let mut stream = Vec::new();
        let page_granules = [0i64, 960, 1920, 2880, 3840];
        let mut offsets = Vec::new();
        for (seq, &granule) in page_granules.iter().enumerate() {
            offsets.push(stream.len() as u64);
            stream.extend(build_page(granule, 1, seq as u32, &[4], &[1, 2, 3, 4]));
        }
        let file_size = stream.len() as u64;
        let mut cursor = Cursor::new(stream);

        let (offset, granule) = seek_by_granule(&mut cursor, 0, file_size, 2000).unwrap();
        assert_eq!(offset, offsets[2]); // granule 1920, the latest <= 2000
        assert_eq!(granule, 1920);

        let (offset, granule) = seek_by_granule(&mut cursor, 0, file_size, 3840).unwrap();
        assert_eq!(offset, offsets[4]);
        assert_eq!(granule, 3840);

        let (offset, granule) = seek_by_granule(&mut cursor, 0, file_size, -1).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(granule, -1);
    }
}

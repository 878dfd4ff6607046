use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

use bytes::{Bytes, BytesMut};

/// Yields the lines of a seekable source last to first, reading at most
/// `chunk_size` bytes per read. Only the unfinished line at a chunk boundary
/// is carried between reads, as a list of chunk slices joined once the line
/// is complete.
#[derive(Debug)]
pub struct ReverseChunkReader<R> {
	source: R,
	chunk_size: usize,
	position: u64,
	lines: VecDeque<Bytes>,
	carry: VecDeque<Bytes>,
	chunks_read: usize,
	done: bool,
}

impl<R: Read + Seek> ReverseChunkReader<R> {
	pub fn new(mut source: R, chunk_size: usize) -> io::Result<Self> {
		let position = source.seek(SeekFrom::End(0))?;
		Ok(ReverseChunkReader {
			source,
			chunk_size: chunk_size.max(1),
			position,
			lines: VecDeque::new(),
			carry: VecDeque::new(),
			chunks_read: 0,
			done: false,
		})
	}

	pub fn chunks_read(&self) -> usize {
		self.chunks_read
	}

	fn read_chunk(&mut self) -> io::Result<()> {
		let start = self.position.saturating_sub(self.chunk_size as u64);
		let len = (self.position - start) as usize;
		let mut chunk = vec![0u8; len];
		self.source.seek(SeekFrom::Start(start))?;
		self.source.read_exact(&mut chunk)?;
		self.position = start;
		self.chunks_read += 1;
		log::debug!("read chunk of {} bytes at offset {}", len, start);

		let chunk = Bytes::from(chunk);
		let mut end = chunk.len();
		let mut complete = false;
		while let Some(newline) = chunk[..end].iter().rposition(|b| *b == b'\n') {
			let tail = chunk.slice(newline + 1..end);
			if complete {
				self.lines.push_back(tail);
			} else {
				self.carry.push_front(tail);
				let line = self.take_carry();
				self.lines.push_back(line);
				complete = true;
			}
			end = newline;
		}
		self.carry.push_front(chunk.slice(..end));
		Ok(())
	}

	fn take_carry(&mut self) -> Bytes {
		match self.carry.len() {
			0 => Bytes::new(),
			1 => self.carry.pop_front().unwrap_or_default(),
			_ => {
				let len = self.carry.iter().map(Bytes::len).sum();
				let mut line = BytesMut::with_capacity(len);
				for segment in self.carry.drain(..) {
					line.extend_from_slice(&segment);
				}
				line.freeze()
			}
		}
	}
}

impl<R: Read + Seek> Iterator for ReverseChunkReader<R> {
	type Item = io::Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(line) = self.lines.pop_front() {
				return Some(Ok(String::from_utf8_lossy(&line).into_owned()));
			}
			if self.done {
				return None;
			}
			if self.position == 0 {
				self.done = true;
				let first = self.take_carry();
				if first.is_empty() {
					return None;
				}
				return Some(Ok(String::from_utf8_lossy(&first).into_owned()));
			}
			if let Err(err) = self.read_chunk() {
				self.done = true;
				return Some(Err(err));
			}
		}
	}
}

use crate::classifier::{ClassifiedTrace, DiskIoRecord, ImageLoadRecord, ProcessRecord, ThreadRecord};
use crate::err::{ReportError, ReportResult};

use serde::Serialize;

pub const DEFAULT_CHUNK_SIZE: usize = 15000;

/// Splits a classified trace into fixed-size pages.
///
/// Disk I/O, threads and images are sliced. Processes are never paginated: every page
/// carries the complete process list as a cross reference.
#[derive(Debug, Clone, Copy)]
pub struct Pagination<'a> {
    trace: &'a ClassifiedTrace,
    chunk_size: usize,
    total_pages: usize,
}

impl<'a> Pagination<'a> {
    pub fn new(trace: &'a ClassifiedTrace, chunk_size: usize) -> ReportResult<Self> {
        if chunk_size == 0 {
            return Err(ReportError::InvalidChunkSize { chunk_size });
        }

        let longest = trace
            .disk_io
            .len()
            .max(trace.threads.len())
            .max(trace.images.len());

        Ok(Pagination {
            trace,
            chunk_size,
            total_pages: longest.div_ceil(chunk_size),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// True when none of the paginated categories has a record, whatever the process count.
    pub fn is_empty(&self) -> bool {
        self.total_pages == 0
    }

    /// Returns page `index` (0-based), `None` past the last page.
    pub fn page(&self, index: usize) -> Option<ReportPage<'a>> {
        if index >= self.total_pages {
            return None;
        }

        let start = index * self.chunk_size;
        let end = start + self.chunk_size;

        Some(ReportPage {
            index,
            total_pages: self.total_pages,
            disk_io: window(&self.trace.disk_io, start, end),
            threads: window(&self.trace.threads, start, end),
            images: window(&self.trace.images, start, end),
            processes: &self.trace.processes,
        })
    }

    pub fn pages(&self) -> Pages<'a> {
        Pages {
            pagination: *self,
            next: 0,
        }
    }
}

fn window<T>(records: &[T], start: usize, end: usize) -> &[T] {
    let start = start.min(records.len());
    let end = end.min(records.len());
    &records[start..end]
}

pub struct Pages<'a> {
    pagination: Pagination<'a>,
    next: usize,
}

impl<'a> Iterator for Pages<'a> {
    type Item = ReportPage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.pagination.page(self.next)?;
        self.next += 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.pagination.total_pages.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pages<'_> {}

/// One page worth of records.
#[derive(Debug, Clone, Copy)]
pub struct ReportPage<'a> {
    index: usize,
    total_pages: usize,
    pub disk_io: &'a [DiskIoRecord],
    pub threads: &'a [ThreadRecord],
    pub images: &'a [ImageLoadRecord],
    /// Always the whole process list.
    pub processes: &'a [ProcessRecord],
}

impl ReportPage<'_> {
    /// 0-based position of this page.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based page number, as shown to users and used in file names.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.number() >= self.total_pages
    }

    pub fn stats(&self) -> PageStats {
        PageStats {
            disk_io: self.disk_io.len(),
            threads: self.threads.len(),
            images: self.images.len(),
            processes: self.processes.len(),
        }
    }
}

/// Row counts shown on a page. `processes` is the global total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub disk_io: usize,
    pub threads: usize,
    pub images: usize,
    pub processes: usize,
}

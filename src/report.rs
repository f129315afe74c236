use crate::classifier::ClassifiedTrace;
use crate::digest::md5_file;
use crate::err::{ReportError, ReportResult, Result, TraceError};
use crate::html_output::{HtmlReport, ReportContext};
use crate::paginator::{DEFAULT_CHUNK_SIZE, Pagination};
use crate::trace_parser::TraceParser;

use jiff::civil::DateTime;
use log::{debug, info};

use std::fs;
use std::path::{Path, PathBuf};

/// Name of the `number`-th (1-based) page file of a case.
pub fn page_file_name(case_id: &str, number: usize) -> String {
    format!("{case_id}_Part_{number}.html")
}

/// Case id of a trace: its file name without the extension.
pub fn case_id_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    chunk_size: usize,
    output_dir: PathBuf,
    confirm_overwrite: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            chunk_size: DEFAULT_CHUNK_SIZE,
            output_dir: PathBuf::from("."),
            confirm_overwrite: true,
        }
    }
}

impl ReportSettings {
    pub fn new() -> Self {
        ReportSettings::default()
    }

    /// Sets the number of rows per page for the paginated categories.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the directory pages are written into.
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// When set, existing page files are only overwritten after confirmation.
    pub fn confirm_overwrite(mut self, confirm_overwrite: bool) -> Self {
        self.confirm_overwrite = confirm_overwrite;
        self
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn get_output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn should_confirm_overwrite(&self) -> bool {
        self.confirm_overwrite
    }
}

/// A parsed and classified trace, ready to be paginated and rendered.
#[derive(Debug, Clone)]
pub struct TraceReport {
    pub case_id: String,
    pub source_digest: String,
    pub trace: ClassifiedTrace,
    settings: ReportSettings,
}

impl TraceReport {
    /// Parses and classifies the trace at `path`, and digests its bytes.
    ///
    /// Fails if the document can't be read or isn't well-formed.
    pub fn from_path(path: impl AsRef<Path>, settings: ReportSettings) -> Result<Self> {
        let path = path.as_ref();

        let events = TraceParser::from_path(path)?.parse_events()?;
        let trace = ClassifiedTrace::from_events(&events);

        let stats = trace.stats();
        debug!(
            "Classified {} of {} events ({} without sub-record, {} uncategorized)",
            stats.classified(),
            stats.total,
            stats.skipped,
            stats.uncategorized
        );

        let source_digest = md5_file(path).map_err(|e| TraceError::FailedToDigest {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(TraceReport {
            case_id: case_id_of(path),
            source_digest,
            trace,
            settings,
        })
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn pagination(&self) -> ReportResult<Pagination<'_>> {
        Pagination::new(&self.trace, self.settings.chunk_size)
    }

    fn context(&self, analyzed_at: DateTime) -> ReportContext {
        ReportContext {
            case_id: self.case_id.clone(),
            source_digest: self.source_digest.clone(),
            analyzed_at,
        }
    }

    /// Renders every page, returning `(file name, document)` pairs in page order.
    pub fn render_pages(&self, analyzed_at: DateTime) -> ReportResult<Vec<(String, String)>> {
        let context = self.context(analyzed_at);
        let renderer = HtmlReport::new(&context);

        Ok(self
            .pagination()?
            .pages()
            .map(|page| {
                (
                    page_file_name(&self.case_id, page.number()),
                    renderer.render(&page),
                )
            })
            .collect())
    }

    /// Writes every page into the output directory, one file per page, in order.
    ///
    /// `confirm` is asked before replacing an existing file when the settings require it.
    /// A refusal stops the run, pages written so far are kept.
    pub fn write_pages<F>(&self, analyzed_at: DateTime, mut confirm: F) -> ReportResult<Vec<PathBuf>>
    where
        F: FnMut(&Path) -> bool,
    {
        let pagination = self.pagination()?;
        let context = self.context(analyzed_at);
        let renderer = HtmlReport::new(&context);

        let output_dir = &self.settings.output_dir;
        fs::create_dir_all(output_dir).map_err(|e| ReportError::FailedToWrite {
            path: output_dir.clone(),
            source: e,
        })?;

        let mut written = Vec::with_capacity(pagination.total_pages());

        for page in pagination.pages() {
            let path = output_dir.join(page_file_name(&self.case_id, page.number()));

            if path.is_dir() {
                return Err(ReportError::OutputIsDirectory { path });
            }

            if path.exists() && self.settings.confirm_overwrite && !confirm(&path) {
                return Err(ReportError::OverwriteDeclined { path });
            }

            fs::write(&path, renderer.render(&page)).map_err(|e| ReportError::FailedToWrite {
                path: path.clone(),
                source: e,
            })?;

            info!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }
}

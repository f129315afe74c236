//! Renders one report page as a self-contained HTML document.
//!
//! Styles and scripts are inlined, the only external resource is a webfont.
//! Every value taken from the trace is escaped before it is written out.

use crate::classifier::{DiskIoRecord, ImageLoadRecord, IoDirection, ProcessRecord, ThreadRecord};
use crate::paginator::ReportPage;
use crate::report::page_file_name;

use jiff::civil::DateTime;
use quick_xml::escape::escape;

const FONTS_URL: &str = "https://fonts.googleapis.com/css2?family=Share+Tech+Mono&family=JetBrains+Mono:wght@400;700&display=swap";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything a page shows that isn't a record.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Base name of the source trace, also the prefix of every page file.
    pub case_id: String,
    /// Uppercase hex MD5 of the source trace.
    pub source_digest: String,
    pub analyzed_at: DateTime,
}

pub struct HtmlReport<'a> {
    context: &'a ReportContext,
}

struct Table<'a> {
    id: &'a str,
    columns: &'a [(&'a str, &'a str)],
    rows: String,
}

impl<'a> HtmlReport<'a> {
    pub fn new(context: &'a ReportContext) -> Self {
        HtmlReport { context }
    }

    pub fn render(&self, page: &ReportPage<'_>) -> String {
        let case_id = escape_html(&self.context.case_id);
        let stats = page.stats();

        let mut html = String::with_capacity(64 * 1024);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "<title>CASE: {case_id} | SEGMENT {}</title>\n",
            page.number()
        ));
        html.push_str(&format!("<link href=\"{FONTS_URL}\" rel=\"stylesheet\">\n"));
        html.push_str("<style>");
        html.push_str(STYLES);
        html.push_str("</style>\n</head>\n<body>\n");

        html.push_str(&self.header(page));

        html.push_str("<div class=\"stats-bar\">\n");
        html.push_str(&format!(
            "<div class=\"stat-item\">DISK I/O: <span>{}</span></div>\n",
            stats.disk_io
        ));
        html.push_str(&format!(
            "<div class=\"stat-item\">THREADS: <span>{}</span></div>\n",
            stats.threads
        ));
        html.push_str(&format!(
            "<div class=\"stat-item\">IMAGES: <span>{}</span></div>\n",
            stats.images
        ));
        html.push_str(&format!(
            "<div class=\"stat-item\">PROCESSES: <span>{} (Global)</span></div>\n",
            stats.processes
        ));
        html.push_str("<input type=\"text\" id=\"filterInput\" class=\"search-box\" placeholder=\"[FILTER LOG DATA...]\" onkeyup=\"filterTable()\">\n");
        html.push_str("</div>\n");

        html.push_str("<div class=\"tabs\">\n");
        for (i, (id, label)) in TABS.iter().enumerate() {
            let class = if i == 0 { "tab-btn active" } else { "tab-btn" };
            html.push_str(&format!(
                "<button class=\"{class}\" onclick=\"openTab(event, '{id}')\">{label}</button>\n"
            ));
        }
        html.push_str("</div>\n");

        let tables = [
            Table {
                id: "DiskIO",
                columns: &[
                    ("100", "DURATION"),
                    ("60", "PID"),
                    ("60", "TYPE"),
                    ("80", "OPERATION"),
                    ("auto", "FILE PATH / KEY"),
                    ("80", "SIZE (B)"),
                ],
                rows: page.disk_io.iter().map(disk_io_row).collect(),
            },
            Table {
                id: "Threads",
                columns: &[
                    ("100", "DURATION"),
                    ("60", "PID"),
                    ("80", "TID"),
                    ("120", "STACK BASE"),
                    ("auto", "START ADDRESS"),
                ],
                rows: page.threads.iter().map(thread_row).collect(),
            },
            Table {
                id: "Images",
                columns: &[
                    ("100", "DURATION"),
                    ("60", "PID"),
                    ("200", "IMAGE NAME"),
                    ("auto", "FULL PATH"),
                    ("80", "SIZE"),
                ],
                rows: page.images.iter().map(image_row).collect(),
            },
            Table {
                id: "Processes",
                columns: &[
                    ("100", "DURATION"),
                    ("60", "PID"),
                    ("60", "PPID"),
                    ("150", "IMAGE NAME"),
                    ("auto", "COMMAND LINE"),
                ],
                rows: page.processes.iter().map(process_row).collect(),
            },
        ];

        for (i, table) in tables.iter().enumerate() {
            html.push_str(&render_table(table, i == 0));
        }

        html.push_str("<script>");
        html.push_str(SCRIPT);
        html.push_str("</script>\n</body>\n</html>\n");

        html
    }

    fn header(&self, page: &ReportPage<'_>) -> String {
        let case_id = escape_html(&self.context.case_id);
        let number = page.number();

        let prev = if page.is_first() {
            "<span class=\"nav-btn disabled\">:: START OF STREAM ::</span>".to_owned()
        } else {
            format!(
                "<a href=\"{}\" class=\"nav-btn\">DATA_BLOCK_PREV [{}]</a>",
                escape_html(&page_file_name(&self.context.case_id, number - 1)),
                number - 1
            )
        };

        let next = if page.is_last() {
            "<span class=\"nav-btn disabled\">:: END OF STREAM ::</span>".to_owned()
        } else {
            format!(
                "<a href=\"{}\" class=\"nav-btn\">DATA_BLOCK_NEXT [{}]</a>",
                escape_html(&page_file_name(&self.context.case_id, number + 1)),
                number + 1
            )
        };

        format!(
            r#"<div class="forensic-header">
<div class="header-box">
<div class="label">CASE FILE ID</div>
<div class="value">{case_id}</div>
<div class="label spaced">SEGMENT</div>
<div class="value segment">{number} <span class="dim">/ {total}</span></div>
</div>
<div class="header-box">
<div class="label">SOURCE INTEGRITY (MD5)</div>
<div class="hash-val">{digest}</div>
<div class="label spaced">ANALYSIS TIMESTAMP</div>
<div class="value stamp">{stamp}</div>
</div>
<div class="nav-controls">
{prev}
{next}
</div>
</div>
"#,
            total = page.total_pages(),
            digest = escape_html(&self.context.source_digest),
            stamp = self.context.analyzed_at.strftime(TIMESTAMP_FORMAT),
        )
    }
}

const TABS: [(&str, &str); 4] = [
    ("DiskIO", "DISK / FILE I/O"),
    ("Threads", "THREADS"),
    ("Images", "IMAGE LOADS"),
    ("Processes", "PROCESSES (ALL)"),
];

fn render_table(table: &Table<'_>, visible: bool) -> String {
    let display = if visible { "block" } else { "none" };

    let cols: String = table
        .columns
        .iter()
        .map(|(width, _)| format!("<col width=\"{width}\">"))
        .collect();
    let headers: String = table
        .columns
        .iter()
        .map(|(_, title)| format!("<th>{title}</th>"))
        .collect();

    format!(
        "<div id=\"{id}\" class=\"tab-content\" style=\"display: {display};\">\n\
         <div class=\"table-wrap\">\n<table>\n\
         <colgroup>{cols}</colgroup>\n\
         <thead><tr>{headers}</tr></thead>\n\
         <tbody>{rows}</tbody>\n\
         </table>\n</div>\n</div>\n",
        id = table.id,
        rows = table.rows,
    )
}

fn disk_io_row(r: &DiskIoRecord) -> String {
    let class = match r.direction {
        IoDirection::Read => "disk-read",
        IoDirection::Write => "disk-write",
        IoDirection::Other => "",
    };

    format!(
        "<tr><td class=\"time\">{}</td><td class=\"pid\">{}</td><td>{}</td><td class=\"{class}\">{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(&r.duration),
        escape_html(&r.pid),
        escape_html(&r.provider),
        escape_html(&r.operation),
        escape_html(&r.path),
        escape_html(&r.size),
    )
}

fn image_row(r: &ImageLoadRecord) -> String {
    format!(
        "<tr><td class=\"time\">{}</td><td class=\"pid\">{}</td><td class=\"exe\">{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(&r.duration),
        escape_html(&r.pid),
        escape_html(&r.image_name),
        escape_html(&r.full_path),
        escape_html(&r.size),
    )
}

fn thread_row(r: &ThreadRecord) -> String {
    format!(
        "<tr><td class=\"time\">{}</td><td class=\"pid\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(&r.duration),
        escape_html(&r.pid),
        escape_html(&r.thread_id),
        escape_html(&r.stack_base),
        escape_html(&r.start_address),
    )
}

fn process_row(r: &ProcessRecord) -> String {
    format!(
        "<tr><td class=\"time\">{}</td><td class=\"pid\">{}</td><td>{}</td><td class=\"exe\">{}</td><td>{}</td></tr>",
        escape_html(&r.duration),
        escape_html(&r.pid),
        escape_html(&r.parent_pid),
        escape_html(&r.image_name),
        escape_html(&r.command_line),
    )
}

/// Escapes `&`, `<`, `>`, `"` and `'` so the text is safe in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    escape(text).into_owned()
}

const STYLES: &str = r#"
:root {
    --bg: #050505; --panel: #0f0f0f; --border: #333;
    --cyan: #00f0ff; --green: #0aff0a; --red: #ff3333;
    --text: #d0d0d0; --dim: #666;
    --font-head: 'Share Tech Mono', monospace;
    --font-body: 'JetBrains Mono', monospace;
}
body { background: var(--bg); color: var(--text); font-family: var(--font-body); margin: 0; padding: 15px; font-size: 11px; overflow: hidden; }
.forensic-header { display: grid; grid-template-columns: 200px 1fr 250px; gap: 10px; border: 1px solid var(--border); background: var(--panel); padding: 10px; margin-bottom: 10px; }
.header-box { display: flex; flex-direction: column; justify-content: center; }
.label { font-family: var(--font-head); color: var(--dim); font-size: 10px; letter-spacing: 1px; margin-bottom: 2px; }
.label.spaced { margin-top: 5px; }
.value { font-family: var(--font-head); color: var(--cyan); font-size: 14px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
.value.segment { color: #fff; }
.value.stamp { font-size: 12px; color: #aaa; }
.dim { color: var(--dim); }
.hash-val { font-size: 10px; color: var(--green); word-break: break-all; }
.nav-controls { display: flex; align-items: center; justify-content: flex-end; gap: 5px; }
.nav-btn { background: #000; border: 1px solid var(--border); color: var(--cyan); padding: 6px 12px; text-decoration: none; font-family: var(--font-head); font-size: 11px; }
.nav-btn:hover { background: var(--cyan); color: #000; }
.nav-btn.disabled { color: #444; border-color: #222; cursor: not-allowed; }
.stats-bar { display: flex; gap: 15px; border-bottom: 1px solid var(--border); padding-bottom: 8px; margin-bottom: 8px; }
.stat-item { font-family: var(--font-head); color: #888; font-size: 12px; }
.stat-item span { color: #fff; font-weight: bold; }
.tabs { display: flex; gap: 2px; }
.tab-btn { background: #111; border: 1px solid var(--border); border-bottom: none; color: #777; padding: 8px 20px; cursor: pointer; font-family: var(--font-head); font-size: 13px; }
.tab-btn:hover { color: var(--cyan); }
.tab-btn.active { color: var(--bg); background: var(--cyan); font-weight: bold; }
.table-wrap { height: calc(100vh - 180px); overflow: auto; border: 1px solid var(--border); border-top: 2px solid var(--cyan); background: #080808; }
table { width: 100%; border-collapse: collapse; min-width: 1000px; }
thead th { position: sticky; top: 0; background: #161616; color: var(--cyan); text-align: left; padding: 6px 8px; font-family: var(--font-head); border-bottom: 1px solid #333; }
tbody td { padding: 3px 8px; border-bottom: 1px solid #111; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; max-width: 450px; color: #ccc; }
tbody tr:nth-child(even) { background: #0b0b0b; }
tbody tr:hover { background: #1a1a1a; color: #fff; }
tbody td:hover { white-space: normal; word-break: break-all; background: #222; }
.search-box { margin-left: auto; background: #000; border: 1px solid #444; color: var(--green); padding: 5px; font-family: var(--font-body); width: 250px; font-size: 11px; }
.time { color: #e5c07b; }
.pid { color: var(--red); font-weight: bold; }
.exe { color: var(--green); }
.disk-read { color: #58a6ff; }
.disk-write { color: #ffb700; }
"#;

const SCRIPT: &str = r#"
function openTab(evt, name) {
    document.querySelectorAll('.tab-content').forEach(x => x.style.display = 'none');
    document.querySelectorAll('.tab-btn').forEach(x => x.classList.remove('active'));
    document.getElementById(name).style.display = 'block';
    evt.currentTarget.classList.add('active');
    filterTable();
}

function filterTable() {
    const needle = document.getElementById('filterInput').value.toUpperCase();
    const active = Array.from(document.querySelectorAll('.tab-content')).find(x => x.style.display === 'block');
    if (!active) return;
    for (const row of active.querySelectorAll('tbody tr')) {
        const text = row.innerText || row.textContent;
        row.style.display = text.toUpperCase().indexOf(needle) > -1 ? '' : 'none';
    }
}
"#;

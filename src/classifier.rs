use crate::trace_event::{EventAttributes, RawEvent, SubRecord};
use crate::utils::decode_tick_duration;

use log::trace;
use serde::Serialize;

/// Placeholder used for fields that resolved to nothing.
pub const MISSING: &str = "-";

const IO_PROVIDERS: [&str; 3] = ["DiskIo", "FileIo", "Registry"];
const IMAGE_LOAD_PROVIDER: &str = "ImageLoad";
const THREAD_PROVIDER: &str = "Thread";
const PROCESS_PROVIDER: &str = "Process";

/// The four buckets an event can land in.
///
/// Variants are declared in the order rules are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    DiskIo,
    ImageLoad,
    Thread,
    Process,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::DiskIo,
        EventCategory::ImageLoad,
        EventCategory::Thread,
        EventCategory::Process,
    ];

    /// Picks the category of a sub-record, first matching rule wins.
    ///
    /// Provider checks are case-sensitive substring tests. A sub-record carrying a non-empty
    /// `ImageFileName` is a process event whatever its provider says.
    pub fn of(record: &SubRecord) -> Option<EventCategory> {
        let provider = record.provider.as_str();

        if IO_PROVIDERS.iter().any(|p| provider.contains(p)) {
            Some(EventCategory::DiskIo)
        } else if provider.contains(IMAGE_LOAD_PROVIDER) {
            Some(EventCategory::ImageLoad)
        } else if provider.contains(THREAD_PROVIDER) {
            Some(EventCategory::Thread)
        } else if provider.contains(PROCESS_PROVIDER)
            || record.attributes.non_empty("ImageFileName").is_some()
        {
            Some(EventCategory::Process)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventCategory::DiskIo => "Disk/File I/O",
            EventCategory::ImageLoad => "Image Loads",
            EventCategory::Thread => "Threads",
            EventCategory::Process => "Processes",
        }
    }
}

/// Visual tag of an I/O row, derived from its operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IoDirection {
    Read,
    Write,
    Other,
}

impl IoDirection {
    /// `Read` is checked first, so an operation mentioning both is a read.
    pub fn of(operation: &str) -> Self {
        if operation.contains("Read") {
            IoDirection::Read
        } else if operation.contains("Write") {
            IoDirection::Write
        } else {
            IoDirection::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskIoRecord {
    pub duration: String,
    pub pid: String,
    pub provider: String,
    pub operation: String,
    pub path: String,
    pub size: String,
    pub direction: IoDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageLoadRecord {
    pub duration: String,
    pub pid: String,
    pub image_name: String,
    pub full_path: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadRecord {
    pub duration: String,
    pub pid: String,
    pub thread_id: String,
    pub stack_base: String,
    pub start_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub duration: String,
    pub pid: String,
    pub parent_pid: String,
    pub image_name: String,
    pub command_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NormalizedRecord {
    DiskIo(DiskIoRecord),
    ImageLoad(ImageLoadRecord),
    Thread(ThreadRecord),
    Process(ProcessRecord),
}

impl NormalizedRecord {
    pub fn category(&self) -> EventCategory {
        match self {
            NormalizedRecord::DiskIo(_) => EventCategory::DiskIo,
            NormalizedRecord::ImageLoad(_) => EventCategory::ImageLoad,
            NormalizedRecord::Thread(_) => EventCategory::Thread,
            NormalizedRecord::Process(_) => EventCategory::Process,
        }
    }
}

/// Fields every category shares.
struct CommonFields {
    duration: String,
    pid: String,
}

/// Normalizes a single event.
///
/// Returns `None` for events without a sub-record, or matching no category.
pub fn classify_event(event: &RawEvent) -> Option<NormalizedRecord> {
    let record = event.record.as_ref()?;
    let category = EventCategory::of(record)?;
    let attrs = &record.attributes;

    let common = CommonFields {
        duration: decode_tick_duration(event.timestamp_or_zero()),
        pid: attrs
            .get("ProcessId")
            .or(event.pid.as_deref())
            .unwrap_or(MISSING)
            .to_owned(),
    };

    let normalized = match category {
        EventCategory::DiskIo => NormalizedRecord::DiskIo(disk_io(common, record)),
        EventCategory::ImageLoad => NormalizedRecord::ImageLoad(image_load(common, attrs)),
        EventCategory::Thread => NormalizedRecord::Thread(thread(common, attrs)),
        EventCategory::Process => NormalizedRecord::Process(process(common, attrs)),
    };

    Some(normalized)
}

fn disk_io(common: CommonFields, record: &SubRecord) -> DiskIoRecord {
    let attrs = &record.attributes;

    let operation = record
        .op_type
        .as_deref()
        .or_else(|| attrs.get("Type"))
        .unwrap_or("Unknown")
        .to_owned();

    let path = match attrs.first_of(&["FileName", "KeyName"]).unwrap_or("") {
        "" => format!("Ref: {}", attrs.get("FileObject").unwrap_or(MISSING)),
        name => name.to_owned(),
    };

    DiskIoRecord {
        duration: common.duration,
        pid: common.pid,
        provider: record.provider.clone(),
        direction: IoDirection::of(&operation),
        operation,
        path,
        size: or_missing(attrs.first_of(&["TransferSize", "IoSize"])),
    }
}

fn image_load(common: CommonFields, attrs: &EventAttributes) -> ImageLoadRecord {
    let full_path = attrs.get("FileName").unwrap_or("").to_owned();

    ImageLoadRecord {
        duration: common.duration,
        pid: common.pid,
        image_name: image_base_name(&full_path).to_owned(),
        size: or_missing(attrs.get("ImageSize")),
        full_path,
    }
}

fn thread(common: CommonFields, attrs: &EventAttributes) -> ThreadRecord {
    ThreadRecord {
        duration: common.duration,
        pid: common.pid,
        thread_id: or_missing(attrs.get("ThreadId")),
        stack_base: or_missing(attrs.get("StackBase")),
        start_address: or_missing(attrs.get("Win32StartAddr")),
    }
}

fn process(common: CommonFields, attrs: &EventAttributes) -> ProcessRecord {
    ProcessRecord {
        duration: common.duration,
        pid: common.pid,
        parent_pid: or_missing(attrs.first_of(&["ParentId", "ParentProcessId"])),
        image_name: attrs.get("ImageFileName").unwrap_or("Unknown").to_owned(),
        command_line: or_missing(attrs.get("CommandLine")),
    }
}

fn or_missing(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_owned()
}

/// The segment after the last backslash, `-` for an empty path.
pub fn image_base_name(path: &str) -> &str {
    if path.is_empty() {
        return MISSING;
    }

    match path.rfind('\\') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Counters describing what happened to the input events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    /// Events seen, including skipped ones.
    pub total: usize,
    /// Events without a sub-record.
    pub skipped: usize,
    /// Events with a sub-record that matched no category.
    pub uncategorized: usize,
}

impl ClassificationStats {
    pub fn classified(&self) -> usize {
        self.total - self.skipped - self.uncategorized
    }
}

/// Normalized records of a whole trace, split per category, each in trace order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedTrace {
    pub disk_io: Vec<DiskIoRecord>,
    pub images: Vec<ImageLoadRecord>,
    pub threads: Vec<ThreadRecord>,
    pub processes: Vec<ProcessRecord>,
    pub(crate) stats: ClassificationStats,
}

impl ClassifiedTrace {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a RawEvent>) -> Self {
        let mut trace = ClassifiedTrace::default();

        for event in events {
            trace.push(event);
        }

        trace
    }

    pub fn push(&mut self, event: &RawEvent) {
        self.stats.total += 1;

        if event.record.is_none() {
            self.stats.skipped += 1;
            return;
        }

        match classify_event(event) {
            Some(NormalizedRecord::DiskIo(r)) => self.disk_io.push(r),
            Some(NormalizedRecord::ImageLoad(r)) => self.images.push(r),
            Some(NormalizedRecord::Thread(r)) => self.threads.push(r),
            Some(NormalizedRecord::Process(r)) => self.processes.push(r),
            None => {
                trace!("Event matched no category");
                self.stats.uncategorized += 1;
            }
        }
    }

    pub fn stats(&self) -> ClassificationStats {
        self.stats
    }

    pub fn len(&self, category: EventCategory) -> usize {
        match category {
            EventCategory::DiskIo => self.disk_io.len(),
            EventCategory::ImageLoad => self.images.len(),
            EventCategory::Thread => self.threads.len(),
            EventCategory::Process => self.processes.len(),
        }
    }

    pub fn total(&self) -> usize {
        EventCategory::ALL.iter().map(|c| self.len(*c)).sum()
    }

    /// Every record, category by category, each category in trace order.
    pub fn records(&self) -> impl Iterator<Item = NormalizedRecord> + '_ {
        let disk_io = self.disk_io.iter().cloned().map(NormalizedRecord::DiskIo);
        let images = self.images.iter().cloned().map(NormalizedRecord::ImageLoad);
        let threads = self.threads.iter().cloned().map(NormalizedRecord::Thread);
        let processes = self.processes.iter().cloned().map(NormalizedRecord::Process);

        disk_io.chain(images).chain(threads).chain(processes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(provider: &str, attrs: &[(&str, &str)]) -> RawEvent {
        let mut record = SubRecord::new(provider);
        for (name, value) in attrs {
            record.attributes.insert(*name, *value);
        }
        RawEvent::new(record).with_timestamp("36610000000")
    }

    #[test]
    fn test_io_takes_priority_over_everything() {
        let e = event("Registry-Process-Thread-ImageLoad", &[("ImageFileName", "x.exe")]);
        assert_eq!(classify_event(&e).unwrap().category(), EventCategory::DiskIo);
    }

    #[test]
    fn test_priority_order_without_io_keyword() {
        let cases = [
            ("ImageLoadThreadProcess", EventCategory::ImageLoad),
            ("ProcessThread", EventCategory::Thread),
            ("Process", EventCategory::Process),
        ];

        for (provider, expected) in cases {
            assert_eq!(
                EventCategory::of(&SubRecord::new(provider)),
                Some(expected),
                "{provider}"
            );
        }
    }

    #[test]
    fn test_provider_match_is_case_sensitive() {
        assert_eq!(EventCategory::of(&SubRecord::new("diskio")), None);
        assert_eq!(EventCategory::of(&SubRecord::new("THREAD")), None);
    }

    #[test]
    fn test_image_file_name_routes_to_process() {
        let e = event("Kernel-General", &[("ImageFileName", "svchost.exe")]);
        let Some(NormalizedRecord::Process(p)) = classify_event(&e) else {
            panic!("expected a process record");
        };
        assert_eq!(p.image_name, "svchost.exe");

        // Empty value does not count.
        let e = event("Kernel-General", &[("ImageFileName", "")]);
        assert_eq!(classify_event(&e), None);
    }

    #[test]
    fn test_disk_io_fallback_chains() {
        let e = event("FileIo", &[("FileObject", "0xABCD")]);
        let Some(NormalizedRecord::DiskIo(r)) = classify_event(&e) else {
            panic!("expected an I/O record");
        };

        assert_eq!(r.path, "Ref: 0xABCD");
        assert_eq!(r.operation, "Unknown");
        assert_eq!(r.size, "-");
        assert_eq!(r.direction, IoDirection::Other);
        assert_eq!(r.pid, "-");
        assert_eq!(r.duration, "0g 01:01:01");
        assert_eq!(r.provider, "FileIo");
    }

    #[test]
    fn test_disk_io_without_file_object() {
        let e = event("DiskIo", &[]);
        let Some(NormalizedRecord::DiskIo(r)) = classify_event(&e) else {
            panic!("expected an I/O record");
        };
        assert_eq!(r.path, "Ref: -");
    }

    #[test]
    fn test_disk_io_prefers_sub_record_type_and_first_names() {
        let mut record = SubRecord::new("DiskIo")
            .with_op_type("ReadWrite")
            .with_attribute("Type", "Write")
            .with_attribute("KeyName", "\\Registry\\Machine")
            .with_attribute("FileName", "C:\\pagefile.sys")
            .with_attribute("IoSize", "512")
            .with_attribute("TransferSize", "4096");
        record.attributes.insert("ProcessId", "1234");

        let e = RawEvent::new(record).with_pid("99");
        let Some(NormalizedRecord::DiskIo(r)) = classify_event(&e) else {
            panic!("expected an I/O record");
        };

        assert_eq!(r.operation, "ReadWrite");
        assert_eq!(r.direction, IoDirection::Read);
        assert_eq!(r.path, "C:\\pagefile.sys");
        assert_eq!(r.size, "4096");
        assert_eq!(r.pid, "1234");
        assert_eq!(r.duration, "0g 00:00:00");
    }

    #[test]
    fn test_disk_io_type_attribute_and_key_name() {
        let e = event(
            "Registry",
            &[("Type", "RegWrite"), ("KeyName", "HKLM\\Run"), ("IoSize", "8")],
        )
        .with_pid("7");
        let Some(NormalizedRecord::DiskIo(r)) = classify_event(&e) else {
            panic!("expected an I/O record");
        };

        assert_eq!(r.operation, "RegWrite");
        assert_eq!(r.direction, IoDirection::Write);
        assert_eq!(r.path, "HKLM\\Run");
        assert_eq!(r.size, "8");
        assert_eq!(r.pid, "7");
    }

    #[test]
    fn test_empty_file_name_does_not_fall_back_to_key_name() {
        let e = event("FileIo", &[("FileName", ""), ("KeyName", "ignored"), ("FileObject", "0x1")]);
        let Some(NormalizedRecord::DiskIo(r)) = classify_event(&e) else {
            panic!("expected an I/O record");
        };
        assert_eq!(r.path, "Ref: 0x1");
    }

    #[test]
    fn test_image_base_name() {
        assert_eq!(image_base_name("C:\\Windows\\System32\\ntdll.dll"), "ntdll.dll");
        assert_eq!(image_base_name("ntdll.dll"), "ntdll.dll");
        assert_eq!(image_base_name("C:\\Windows\\"), "");
        assert_eq!(image_base_name(""), "-");
    }

    #[test]
    fn test_image_load_record() {
        let e = event(
            "ImageLoad",
            &[("FileName", "\\Device\\HarddiskVolume3\\Windows\\kernel32.dll"), ("ImageSize", "0x1000")],
        );
        let Some(NormalizedRecord::ImageLoad(r)) = classify_event(&e) else {
            panic!("expected an image record");
        };

        assert_eq!(r.image_name, "kernel32.dll");
        assert_eq!(r.full_path, "\\Device\\HarddiskVolume3\\Windows\\kernel32.dll");
        assert_eq!(r.size, "0x1000");

        let Some(NormalizedRecord::ImageLoad(r)) = classify_event(&event("ImageLoad", &[])) else {
            panic!("expected an image record");
        };
        assert_eq!(r.image_name, "-");
        assert_eq!(r.full_path, "");
        assert_eq!(r.size, "-");
    }

    #[test]
    fn test_thread_record() {
        let e = event(
            "Thread",
            &[("ThreadId", "0x10"), ("StackBase", "0xfff0"), ("Win32StartAddr", "0x7ff0")],
        );
        let Some(NormalizedRecord::Thread(r)) = classify_event(&e) else {
            panic!("expected a thread record");
        };

        assert_eq!(
            r,
            ThreadRecord {
                duration: "0g 01:01:01".to_owned(),
                pid: "-".to_owned(),
                thread_id: "0x10".to_owned(),
                stack_base: "0xfff0".to_owned(),
                start_address: "0x7ff0".to_owned(),
            }
        );
    }

    #[test]
    fn test_process_parent_pid_chain() {
        let with_parent_id = event("Process", &[("ParentId", "1"), ("ParentProcessId", "2")]);
        let with_parent_process_id = event("Process", &[("ParentProcessId", "2")]);
        let without = event("Process", &[]);

        let parent = |e: &RawEvent| match classify_event(e) {
            Some(NormalizedRecord::Process(p)) => p.parent_pid,
            other => panic!("expected a process record, got {other:?}"),
        };

        assert_eq!(parent(&with_parent_id), "1");
        assert_eq!(parent(&with_parent_process_id), "2");
        assert_eq!(parent(&without), "-");
    }

    #[test]
    fn test_process_defaults() {
        let Some(NormalizedRecord::Process(p)) = classify_event(&event("Process", &[])) else {
            panic!("expected a process record");
        };
        assert_eq!(p.image_name, "Unknown");
        assert_eq!(p.command_line, "-");
    }

    #[test]
    fn test_malformed_timestamp_is_passed_through() {
        let e = RawEvent::new(SubRecord::new("Thread")).with_timestamp("not-a-number");
        let Some(NormalizedRecord::Thread(r)) = classify_event(&e) else {
            panic!("expected a thread record");
        };
        assert_eq!(r.duration, "not-a-number");
    }

    #[test]
    fn test_missing_timestamp_decodes_as_zero() {
        let e = RawEvent::new(SubRecord::new("Thread"));
        let Some(NormalizedRecord::Thread(r)) = classify_event(&e) else {
            panic!("expected a thread record");
        };
        assert_eq!(r.duration, "0g 00:00:00");
    }

    #[test]
    fn test_classified_trace_counts_and_order() {
        let events = vec![
            event("Thread", &[("ThreadId", "1")]),
            RawEvent::default(),
            event("Kernel-Network", &[]),
            event("DiskIo", &[("FileName", "a")]),
            event("Thread", &[("ThreadId", "2")]),
            event("Process", &[]),
            event("ImageLoad", &[]),
            event("DiskIo", &[("FileName", "b")]),
        ];

        let trace = ClassifiedTrace::from_events(&events);

        let thread_ids: Vec<_> = trace.threads.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(thread_ids, vec!["1", "2"]);
        let paths: Vec<_> = trace.disk_io.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);

        assert_eq!(trace.len(EventCategory::Process), 1);
        assert_eq!(trace.len(EventCategory::ImageLoad), 1);
        assert_eq!(trace.total(), 6);

        let stats = trace.stats();
        assert_eq!(stats.total, 8);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.uncategorized, 1);
        assert_eq!(stats.classified(), trace.total());
    }

    #[test]
    fn test_records_are_tagged_by_category() {
        let events = vec![event("Process", &[]), event("DiskIo", &[])];
        let trace = ClassifiedTrace::from_events(&events);

        let categories: Vec<_> = trace.records().map(|r| r.category()).collect();
        assert_eq!(categories, vec![EventCategory::DiskIo, EventCategory::Process]);
    }
}

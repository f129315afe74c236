
#[cfg(target_os = "windows")]
mod tests {}

#[cfg(not(target_os = "windows"))]
mod tests {
    use super::fixtures::*;

    use rexpect::spawn;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn command_line(output_dir: &std::path::Path) -> String {
        format!(
            "{bin} -f {sample} -d {output_dir}",
            bin = assert_cmd::cargo_bin!("wdi_report").display(),
            sample = boot_trace_sample().to_str().unwrap(),
            output_dir = output_dir.to_string_lossy(),
        )
    }

    // It should behave the same on windows, but interactive testing relies on unix pty internals.
    #[test]
    fn test_it_confirms_before_overwriting_a_page() {
        let d = tempdir().unwrap();
        let f = d.as_ref().join("boot_trace_Part_1.html");

        let mut file = File::create(&f).unwrap();
        file.write_all(b"I'm a file!").unwrap();

        let mut p = spawn(&command_line(d.as_ref()), Some(10000)).unwrap();
        p.exp_regex(r#"Are you sure you want to overwrite.*"#)
            .unwrap();
        p.send_line("y").unwrap();
        p.exp_string("Report Generated").unwrap();

        let page = fs::read_to_string(&f).unwrap();
        assert!(
            page.starts_with("<!DOCTYPE html>"),
            "Expected the page to be replaced"
        )
    }

    #[test]
    fn test_it_confirms_before_overwriting_a_page_and_quits() {
        let d = tempdir().unwrap();
        let f = d.as_ref().join("boot_trace_Part_1.html");

        let mut file = File::create(&f).unwrap();
        file.write_all(b"I'm a file!").unwrap();

        let mut p = spawn(&command_line(d.as_ref()), Some(10000)).unwrap();
        p.exp_regex(r#"Are you sure you want to overwrite.*"#)
            .unwrap();
        p.send_line("n").unwrap();
        p.exp_eof().unwrap();

        assert_eq!(fs::read_to_string(&f).unwrap(), "I'm a file!");
    }
}

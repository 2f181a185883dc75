//! Process listing in the classic `ps` layout

use std::fmt::Write;

use sched_api::{ProcInfo, ProcState};

pub const HEADER: &str = "PID\tSTATE\t\tPRIORITY\tRUNTIME\tBURST\tNAME";

const RULE_WIDTH: usize = 50;

/// One row; states are padded to eight columns so the tabs line up
pub fn format_row(info: &ProcInfo) -> String {
    format!(
        "{}\t{:<8}\t{}\t\t{}\t{}\t{}",
        info.pid,
        info.state.label(),
        info.priority,
        info.runtime,
        info.estimated_burst,
        info.name
    )
}

/// Header, rule, and one row per live slot
pub fn format_table(rows: &[ProcInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", HEADER);
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for info in rows.iter().filter(|info| info.state != ProcState::Unused) {
        let _ = writeln!(out, "{}", format_row(info));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_api::ProcName;

    fn info(pid: i32, state: ProcState, name: &str) -> ProcInfo {
        ProcInfo {
            pid,
            state,
            priority: 60,
            runtime: 7,
            estimated_burst: 5,
            name: ProcName::new(name),
        }
    }

    #[test]
    fn rows_pad_state() {
        assert_eq!(
            format_row(&info(3, ProcState::Running, "sh")),
            "3\tRUNNING \t60\t\t7\t5\tsh"
        );
        assert_eq!(
            format_row(&info(4, ProcState::Sleeping, "cat")),
            "4\tSLEEPING\t60\t\t7\t5\tcat"
        );
    }

    #[test]
    fn table_skips_unused_slots() {
        let rows = [
            info(1, ProcState::Sleeping, "init"),
            info(0, ProcState::Unused, ""),
            info(2, ProcState::Zombie, "child"),
        ];
        let table = format_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1].len(), RULE_WIDTH);
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].starts_with("1\tSLEEPING"));
        assert!(lines[3].starts_with("2\tZOMBIE  "));
    }

    #[test]
    fn empty_listing_keeps_header() {
        assert_eq!(format_table(&[]).lines().count(), 2);
    }
}

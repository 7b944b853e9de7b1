// SPDX-License-Identifier: GPL-3.0-only

//! Hierarchical execution report
//!
//! Every Operation, Job and dispatched command writes into its own child node.
//! Nodes are append-only: lines and children are added, never removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final state recorded on a report node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Error,
}

/// A single node of the report tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// What this node describes (operation or job description)
    pub action: String,

    /// Resolved command line, set when the node belongs to an external command
    pub command: Option<String>,

    /// Exit code of the command, if one was dispatched and completed
    pub exit_code: Option<i32>,

    /// Human readable output and failure explanations
    pub lines: Vec<String>,

    /// Outcome, `None` while still running
    pub status: Option<ReportStatus>,

    pub started_at: Option<DateTime<Utc>>,

    pub children: Vec<Report>,
}

impl Report {
    /// Create a root report
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Append a child node and return it for writing
    pub fn new_child(&mut self, action: impl Into<String>) -> &mut Report {
        self.children.push(Report::new(action));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Append captured command output, one report line per output line
    pub fn append_output(&mut self, output: &str) {
        self.lines
            .extend(output.lines().filter(|l| !l.is_empty()).map(str::to_string));
    }

    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = Some(command.into());
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub fn set_status(&mut self, status: ReportStatus) {
        self.status = Some(status);
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// Depth-first search for the first node that ended in error
    pub fn first_error(&self) -> Option<&Report> {
        let failed = |r: &Report| r.status == Some(ReportStatus::Error);
        if failed(self) && !self.children.iter().any(failed) {
            return Some(self);
        }
        self.children.iter().find_map(Report::first_error)
    }

    /// Plain-text rendering, children indented by two spaces per level
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, 0);
        out
    }

    fn write_text(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);

        if !self.action.is_empty() {
            out.push_str(&indent);
            out.push_str(&self.action);
            out.push('\n');
        }

        if let Some(command) = &self.command {
            out.push_str(&format!("{indent}  {command}\n"));
        }

        for line in &self.lines {
            out.push_str(&format!("{indent}  {line}\n"));
        }

        for child in &self.children {
            child.write_text(out, depth + 1);
        }

        match self.status {
            Some(ReportStatus::Success) => out.push_str(&format!("{indent}  Success\n")),
            Some(ReportStatus::Error) => out.push_str(&format!("{indent}  Error\n")),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_keep_insertion_order() {
        let mut root = Report::new("root");
        root.new_child("first").line("a");
        root.new_child("second").line("b");

        let actions: Vec<_> = root.children.iter().map(|c| c.action.as_str()).collect();
        assert_eq!(actions, ["first", "second"]);
    }

    #[test]
    fn text_rendering_indents_nested_nodes() {
        let mut root = Report::new("Resize partition");
        let job = root.new_child("Check file system");
        let cmd = job.new_child("");
        cmd.set_command("Command: xfs_repair -v /dev/sda1");
        job.set_status(ReportStatus::Success);

        let text = root.to_text();
        assert!(text.starts_with("Resize partition\n"));
        assert!(text.contains("  Check file system\n"));
        assert!(text.contains("      Command: xfs_repair -v /dev/sda1\n"));
        assert!(text.contains("    Success\n"));
    }

    #[test]
    fn first_error_finds_deepest_failing_node() {
        let mut root = Report::new("run");
        let op = root.new_child("op");
        op.set_status(ReportStatus::Error);
        let job = op.new_child("job");
        job.line("mkfs.xfs failed");
        job.set_status(ReportStatus::Error);

        let failing = root.first_error().expect("error node");
        assert_eq!(failing.action, "job");
    }

    #[test]
    fn serialized_tree_keeps_commands_and_status() {
        let mut root = Report::new("Run");
        let job = root.new_child("Create file system");
        job.set_command("mkfs.ext4 -qF /dev/sdb1");
        job.set_exit_code(0);
        job.set_status(ReportStatus::Success);

        let json = serde_json::to_value(&root).expect("serialize");
        assert_eq!(json["children"][0]["command"], "mkfs.ext4 -qF /dev/sdb1");

        let back: Report = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, root);
    }

    #[test]
    fn append_output_skips_blank_lines() {
        let mut node = Report::default();
        node.append_output("one\n\ntwo\n");
        assert_eq!(node.lines, ["one", "two"]);
    }
}

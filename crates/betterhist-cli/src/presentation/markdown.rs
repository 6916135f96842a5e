//! Fenced Markdown blocks: the command line followed by its literal output.

use betterhist_types::Record;

const MIN_FENCE: usize = 3;
const NOTE_PREFIX: &str = "_[";
const NOTE_SUFFIX: &str = " bytes of output not stored]_";

/// Fence tag for a shell program name.
pub fn fence_language(shell: &str) -> &'static str {
    let name = shell.rsplit('/').next().unwrap_or(shell).trim_start_matches('-');
    match name {
        "bash" => "bash",
        "zsh" => "zsh",
        "fish" => "fish",
        _ => "shell",
    }
}

/// Render each record as its own block, separated by a blank line.
pub fn render_markdown(records: &[Record], language: &str) -> String {
    records
        .iter()
        .map(|record| render_block(record, language))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_block(record: &Record, language: &str) -> String {
    let fence = "`".repeat(fence_len(&record.command, &record.output));

    let mut block = format!("{}{}\n{}\n", fence, language, record.command);
    if !record.output.is_empty() {
        block.push_str(&record.output);
        block.push('\n');
    }
    block.push_str(&fence);

    if record.is_truncated() {
        block.push('\n');
        block.push_str(&format!(
            "{}{}{}",
            NOTE_PREFIX,
            record.elided_bytes(),
            NOTE_SUFFIX
        ));
    }
    block
}

/// Longer than any backtick run in the content, and at least three.
fn fence_len(command: &str, output: &str) -> usize {
    let longest = command
        .split(|c| c != '`')
        .chain(output.split(|c| c != '`'))
        .map(str::len)
        .max()
        .unwrap_or(0);
    (longest + 1).max(MIN_FENCE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub language: String,
    pub command: String,
    pub output: String,
    /// Bytes reported missing by the elision note, if any.
    pub elided_bytes: Option<u64>,
}

/// Inverse of [`render_block`].
pub fn parse_markdown_block(text: &str) -> Option<ParsedBlock> {
    let text = text.trim_end_matches('\n');

    let (block, elided_bytes) = match text.rsplit_once('\n') {
        Some((head, last)) => match parse_note(last) {
            Some(bytes) => (head, Some(bytes)),
            None => (text, None),
        },
        None => (text, None),
    };

    let (opening, rest) = block.split_once('\n')?;
    let fence_width = opening.chars().take_while(|&c| c == '`').count();
    if fence_width < MIN_FENCE {
        return None;
    }
    let fence = &opening[..fence_width];
    let language = opening[fence_width..].to_string();

    let body = rest.strip_suffix(fence)?;
    let (command, remainder) = body.split_once('\n')?;
    // Non-empty output carries its own line break before the closing fence.
    let output = if remainder.is_empty() {
        remainder
    } else {
        remainder.strip_suffix('\n')?
    };

    Some(ParsedBlock {
        language,
        command: command.to_string(),
        output: output.to_string(),
        elided_bytes,
    })
}

fn parse_note(line: &str) -> Option<u64> {
    line.strip_prefix(NOTE_PREFIX)?
        .strip_suffix(NOTE_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use betterhist_types::{NewRecord, RecordId};

    fn record(command: &str, output: &str) -> Record {
        NewRecord::new(command, output).into_record(RecordId::new(1))
    }

    #[test]
    fn test_empty_output_has_no_output_lines() {
        let block = render_block(&record("conda activate bh", ""), "bash");
        assert_eq!(block, "```bash\nconda activate bh\n```");
    }

    #[test]
    fn test_block_layout() {
        let block = render_block(&record("ls", "a.txt\nb.txt"), "zsh");
        assert_eq!(block, "```zsh\nls\na.txt\nb.txt\n```");
    }

    #[test]
    fn test_fence_outgrows_backtick_runs() {
        let block = render_block(&record("cat README.md", "```rust\nfn main() {}\n```"), "bash");
        assert!(block.starts_with("````bash\n"));
        assert!(block.ends_with("\n````"));
    }

    #[test]
    fn test_round_trip_preserves_text_exactly() {
        let cases = [
            ("conda activate bh", ""),
            ("ls", "a\nb"),
            ("printf 'x\\n\\n'", "x\n"),
            ("echo", "\n"),
            ("cat notes", "````\nnested ``` fences\n````"),
            ("ls --color", "\x1b[34mdir\x1b[0m  file"),
            ("", ""),
        ];

        for (command, output) in cases {
            let block = render_block(&record(command, output), "bash");
            let parsed = parse_markdown_block(&block).unwrap();
            assert_eq!(parsed.command, command, "block: {:?}", block);
            assert_eq!(parsed.output, output, "block: {:?}", block);
            assert_eq!(parsed.language, "bash");
            assert_eq!(parsed.elided_bytes, None);
        }
    }

    #[test]
    fn test_truncated_record_gets_note() {
        let mut record = record("yes | head -c 10000000", "y\ny");
        record.raw_length = 1000;

        let block = render_block(&record, "bash");
        assert!(block.ends_with("\n```\n_[997 bytes of output not stored]_"));

        let parsed = parse_markdown_block(&block).unwrap();
        assert_eq!(parsed.output, "y\ny");
        assert_eq!(parsed.elided_bytes, Some(997));
    }

    #[test]
    fn test_multiple_records_are_separated() {
        let text = render_markdown(&[record("a", "1"), record("b", "")], "shell");
        assert_eq!(text, "```shell\na\n1\n```\n\n```shell\nb\n```");
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("/bin/bash"), "bash");
        assert_eq!(fence_language("-zsh"), "zsh");
        assert_eq!(fence_language("/usr/local/bin/fish"), "fish");
        assert_eq!(fence_language("/bin/dash"), "shell");
    }

    #[test]
    fn test_rejects_non_block() {
        assert!(parse_markdown_block("just text").is_none());
        assert!(parse_markdown_block("``\nls\n``").is_none());
    }
}

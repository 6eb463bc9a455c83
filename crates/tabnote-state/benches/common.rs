// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use tabnote_state::{ChangeSet, ChangeSpec, Text};

#[allow(dead_code)]
pub fn generate_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Line {i} of the document, with some prose to give it width."))
        .collect()
}

#[allow(dead_code)]
pub fn generate_text(lines: usize) -> Text {
    Text::of(generate_lines(lines)).unwrap()
}

/// `count` small edits spread evenly over a document of length `len`.
#[allow(dead_code)]
pub fn scattered_edits(len: usize, count: usize) -> ChangeSet {
    let step = (len / count.max(1)).max(2);
    let specs = (0..count)
        .map(|i| i * step)
        .take_while(|pos| pos + 1 < len)
        .map(|pos| ChangeSpec::replace(pos, pos + 1, "xy"))
        .collect::<Vec<_>>();
    ChangeSet::of(specs, len, None).unwrap()
}

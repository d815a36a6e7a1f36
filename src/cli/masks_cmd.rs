//! `masks` subcommand: print the attention masks for one step.
//!
//! Useful when checking what a model adapter will receive for a given
//! source/prefix pair without running a model.

use crate::engine::{build_masks, Mask};

/// Parse a comma-separated id list such as `5,6,0`.
pub fn parse_ids(arg: &str) -> Result<Vec<u32>, String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|e| format!("invalid token id {s:?}: {e}")))
        .collect()
}

fn render(name: &str, mask: &Mask) -> String {
    let mut out = format!("{name} [{} x {} x {}]\n", mask.batch, mask.rows, mask.cols);
    for b in 0..mask.batch {
        for i in 0..mask.rows {
            let row: Vec<&str> = (0..mask.cols)
                .map(|j| if mask.is_masked(b, i, j) { "1" } else { "0" })
                .collect();
            out.push_str("  ");
            out.push_str(&row.join(" "));
            out.push('\n');
        }
    }
    out
}

/// Returns a process exit code.
pub fn run(source: &str, target: &str) -> i32 {
    let (source, target) = match (parse_ids(source), parse_ids(target)) {
        (Ok(s), Ok(t)) => (s, t),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{}", e);
            return 2;
        }
    };
    match build_masks(&[source], &[target]) {
        Ok(masks) => {
            print!("{}", render("encoder_padding", &masks.encoder_padding));
            print!("{}", render("look_ahead", &masks.look_ahead));
            print!("{}", render("decoder_padding", &masks.decoder_padding));
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

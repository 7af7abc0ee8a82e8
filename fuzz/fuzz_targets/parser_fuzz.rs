#![no_main]
use libfuzzer_sys::fuzz_target;

const SUBCOMMANDS: [&str; 4] = ["diff", "restore", "show", "config"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let mut args = vec![SUBCOMMANDS[usize::from(selector) % SUBCOMMANDS.len()].to_string()];
    args.extend(
        String::from_utf8_lossy(rest)
            .split_whitespace()
            .take(32)
            .map(str::to_string),
    );
    resdelta::cli::fuzz_try_parse_args(&args);
});
